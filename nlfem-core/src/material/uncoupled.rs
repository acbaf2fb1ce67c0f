//! Solid built from an uncoupled formulation.
//!
//! Adds the volumetric response U(J) = k/2 (ln J)² to the deviatoric part:
//!
//! ```text
//! σ = σ̃ + p I,                 p   = U'(J)  = k ln J / J
//! c = c̃ + p (I⊗I - 2 I4) + J U''(J) I⊗I,  U'' = k (1 - ln J) / J²
//! ```

use crate::material::{Material, MaterialPoint, UncoupledMaterial};
use crate::types::{identity4, identity_dyad, Mat3, Tangent};

/// Adapter exposing an [`UncoupledMaterial`] as a [`Material`].
#[derive(Debug)]
pub struct UncoupledSolid {
    inner: Box<dyn UncoupledMaterial>,
}

impl UncoupledSolid {
    pub fn new(inner: Box<dyn UncoupledMaterial>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &dyn UncoupledMaterial {
        self.inner.as_ref()
    }

    fn pressure(&self, j: f64) -> f64 {
        self.inner.bulk_modulus() * j.ln() / j
    }
}

impl Material for UncoupledSolid {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn density(&self) -> f64 {
        self.inner.density()
    }

    fn stress(&self, pt: &MaterialPoint) -> Mat3 {
        self.inner.dev_stress(pt) + Mat3::identity() * self.pressure(pt.elastic.j)
    }

    fn tangent(&self, pt: &MaterialPoint) -> Tangent {
        let j = pt.elastic.j;
        let p = self.pressure(j);
        let ujj = self.inner.bulk_modulus() * (1.0 - j.ln()) / (j * j);
        let ixi = identity_dyad();
        self.inner.dev_tangent(pt) + (ixi - identity4() * 2.0) * p + ixi * (ujj * j)
    }

    fn strain_energy_density(&self, pt: &MaterialPoint) -> f64 {
        let lnj = pt.elastic.j.ln();
        self.inner.dev_strain_energy_density(pt) + 0.5 * self.inner.bulk_modulus() * lnj * lnj
    }

    fn create_point(&self) -> MaterialPoint {
        self.inner.create_point()
    }

    fn commit(&self, pt: &mut MaterialPoint) {
        self.inner.commit(pt);
    }
}
