//! Tension-only fiber with a power-law toe region and a linear region.
//!
//! With the fiber invariant In = n0·C·n0 and I0 = λ0²:
//!
//! ```text
//! W = ξ/β (In - 1)^β                                      1 < In < I0
//! W = b (In - I0) - E (√In - √I0) + ξ/β (I0 - 1)^β        In ≥ I0
//! ```
//!
//! ξ and b are chosen so stress and tangent are continuous at In = I0.
//! Fibers carry nothing once In - 1 ≤ 0.

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::material::params::{MaterialSpec, ParamDecl, ParamRange, DENSITY};
use crate::material::registry::MaterialRegistry;
use crate::material::{Material, MaterialPoint};
use crate::types::{dyad1s, Mat3, Tangent};

pub const KIND: &str = "fiber-pow-linear";

const E: ParamDecl = ParamDecl::required("E", ParamRange::Greater(0.0));
const LAM0: ParamDecl = ParamDecl::required("lam0", ParamRange::Greater(1.0));
const BETA: ParamDecl = ParamDecl::required("beta", ParamRange::GreaterOrEqual(2.0));
const THETA: ParamDecl = ParamDecl::optional("theta", ParamRange::Any, 0.0);
const PHI: ParamDecl = ParamDecl::optional("phi", ParamRange::Any, 90.0);

/// Compression cutoff on In - 1.
const EPS: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FiberPowLinear {
    /// Fiber modulus in the linear region.
    pub e: f64,
    /// Stretch at the end of the toe region.
    pub lam0: f64,
    /// Toe exponent.
    pub beta: f64,
    /// Fiber direction in local material axes.
    pub n0: Vector3<f64>,
    pub density: f64,
    i0: f64,
    ksi: f64,
    b: f64,
}

impl FiberPowLinear {
    /// Create a fiber with direction given by spherical angles in degrees.
    ///
    /// # Errors
    ///
    /// Rejects E ≤ 0, λ0 ≤ 1 and β < 2.
    pub fn new(e: f64, lam0: f64, beta: f64, theta: f64, phi: f64) -> Result<Self> {
        if !(e > 0.0) {
            return Err(Error::invalid_material("E", "E must be positive"));
        }
        if !(lam0 > 1.0) {
            return Err(Error::invalid_material("lam0", "lam0 must be > 1"));
        }
        if !(beta >= 2.0) {
            return Err(Error::invalid_material("beta", "beta must be >= 2"));
        }

        let (the, ph) = (theta.to_radians(), phi.to_radians());
        let n0 = Vector3::new(the.cos() * ph.sin(), the.sin() * ph.sin(), ph.cos());

        let i0 = lam0 * lam0;
        let ksi = e / 4.0 / (beta - 1.0) * i0.powf(-1.5) * (i0 - 1.0).powf(2.0 - beta);
        let b = ksi * (i0 - 1.0).powf(beta - 1.0) + e / 2.0 / i0.sqrt();

        Ok(Self {
            e,
            lam0,
            beta,
            n0,
            density: 1.0,
            i0,
            ksi,
            b,
        })
    }

    pub(crate) fn from_spec(spec: &MaterialSpec, _registry: &MaterialRegistry) -> Result<Box<dyn Material>> {
        spec.check_known(&[E, LAM0, BETA, THETA, PHI, DENSITY])?;
        let mut fiber = Self::new(
            spec.value(&E)?,
            spec.value(&LAM0)?,
            spec.value(&BETA)?,
            spec.value(&THETA)?,
            spec.value(&PHI)?,
        )?;
        fiber.density = spec.value(&DENSITY)?;
        Ok(Box::new(fiber))
    }

    /// Fiber invariant In and referential direction n0 = Q a0.
    pub fn invariant(&self, pt: &MaterialPoint) -> (f64, Vector3<f64>) {
        let n0 = pt.elastic.q * self.n0;
        let c = pt.elastic.right_cauchy_green();
        (n0.dot(&(c * n0)), n0)
    }

    /// Structure tensor nt ⊗ nt of the current fiber direction.
    fn structure(&self, pt: &MaterialPoint, n0: &Vector3<f64>, i_n: f64) -> Mat3 {
        let nt = pt.elastic.f * n0 / i_n.sqrt();
        nt * nt.transpose()
    }
}

impl Material for FiberPowLinear {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn density(&self) -> f64 {
        self.density
    }

    fn stress(&self, pt: &MaterialPoint) -> Mat3 {
        let (i_n, n0) = self.invariant(pt);
        if i_n - 1.0 <= EPS {
            return Mat3::zeros();
        }
        let sn = if i_n < self.i0 {
            2.0 * i_n * self.ksi * (i_n - 1.0).powf(self.beta - 1.0)
        } else {
            2.0 * self.b * i_n - self.e * i_n.sqrt()
        };
        self.structure(pt, &n0, i_n) * (sn / pt.elastic.j)
    }

    fn tangent(&self, pt: &MaterialPoint) -> Tangent {
        let (i_n, n0) = self.invariant(pt);
        if i_n - 1.0 <= EPS {
            return Tangent::zeros();
        }
        let cn = if i_n < self.i0 {
            4.0 * i_n * i_n * self.ksi * (self.beta - 1.0) * (i_n - 1.0).powf(self.beta - 2.0)
        } else {
            self.e * i_n.sqrt()
        };
        dyad1s(&self.structure(pt, &n0, i_n)) * (cn / pt.elastic.j)
    }

    fn strain_energy_density(&self, pt: &MaterialPoint) -> f64 {
        let (i_n, _) = self.invariant(pt);
        if i_n - 1.0 <= EPS {
            return 0.0;
        }
        if i_n < self.i0 {
            self.ksi / self.beta * (i_n - 1.0).powf(self.beta)
        } else {
            self.b * (i_n - self.i0) - self.e * (i_n.sqrt() - self.i0.sqrt())
                + self.ksi / self.beta * (self.i0 - 1.0).powf(self.beta)
        }
    }
}
