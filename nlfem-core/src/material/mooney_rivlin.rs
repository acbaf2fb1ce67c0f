//! Uncoupled Mooney-Rivlin solid.
//!
//! W̃ = c1 (Ĩ1 - 3) + c2 (Ĩ2 - 3), with invariants of the isochoric
//! left Cauchy-Green tensor B̃ = J^(-2/3) b.

use crate::error::{Error, Result};
use crate::material::params::{MaterialSpec, ParamDecl, ParamRange, DENSITY};
use crate::material::registry::MaterialRegistry;
use crate::material::{MaterialPoint, UncoupledMaterial};
use crate::types::{deviator, dyad1s, dyad1s_pair, dyad4s, identity4, identity_dyad, Mat3, Tangent};

pub const KIND: &str = "Mooney-Rivlin";

const C1: ParamDecl = ParamDecl::required("c1", ParamRange::Any);
const C2: ParamDecl = ParamDecl::optional("c2", ParamRange::Any, 0.0);
const K: ParamDecl = ParamDecl::required("k", ParamRange::GreaterOrEqual(0.0));

#[derive(Debug, Clone, PartialEq)]
pub struct MooneyRivlin {
    pub c1: f64,
    pub c2: f64,
    /// Bulk modulus of the volumetric penalty.
    pub k: f64,
    pub density: f64,
}

impl MooneyRivlin {
    pub fn new(c1: f64, c2: f64, k: f64) -> Result<Self> {
        if !(c1 + c2 > 0.0) {
            return Err(Error::invalid_material("c1", "c1 + c2 must be positive"));
        }
        if !(k >= 0.0) {
            return Err(Error::invalid_material("k", "bulk modulus must be non-negative"));
        }
        Ok(Self { c1, c2, k, density: 1.0 })
    }

    pub(crate) fn from_spec(spec: &MaterialSpec, _registry: &MaterialRegistry) -> Result<Box<dyn UncoupledMaterial>> {
        spec.check_known(&[C1, C2, K, DENSITY])?;
        let mut material = Self::new(spec.value(&C1)?, spec.value(&C2)?, spec.value(&K)?)?;
        material.density = spec.value(&DENSITY)?;
        Ok(Box::new(material))
    }

    /// B̃, B̃² and the invariants Ĩ1, Ĩ2.
    fn invariants(pt: &MaterialPoint) -> (Mat3, Mat3, f64, f64) {
        let b = pt.elastic.dev_left_cauchy_green();
        let b2 = b * b;
        let i1 = b.trace();
        let i2 = 0.5 * (i1 * i1 - b2.trace());
        (b, b2, i1, i2)
    }
}

impl UncoupledMaterial for MooneyRivlin {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn density(&self) -> f64 {
        self.density
    }

    fn bulk_modulus(&self) -> f64 {
        self.k
    }

    fn dev_stress(&self, pt: &MaterialPoint) -> Mat3 {
        let (b, b2, i1, _) = Self::invariants(pt);
        let (w1, w2) = (self.c1, self.c2);
        let t = b * (w1 + w2 * i1) - b2 * w2;
        deviator(&t) * (2.0 / pt.elastic.j)
    }

    fn dev_tangent(&self, pt: &MaterialPoint) -> Tangent {
        let j = pt.elastic.j;
        let ji = 1.0 / j;
        let (b, b2, i1, i2) = Self::invariants(pt);
        let (w1, w2) = (self.c1, self.c2);

        // W,C:C and C:W,CC:C
        let wc = w1 * i1 + 2.0 * w2 * i2;
        let cwwc = 2.0 * w2 * i2;
        // W,CC:C
        let wccxc = b * (w2 * i1) - b2 * w2;

        let i = Mat3::identity();
        let ixi = identity_dyad();
        let i4 = identity4();
        let bxb = dyad1s(&b);
        let b4 = dyad4s(&b);
        let devs = self.dev_stress(pt);

        let cw = (bxb - b4) * (w2 * 4.0 * ji) - dyad1s_pair(&wccxc, &i) * (4.0 / 3.0 * ji)
            + ixi * (4.0 / 9.0 * ji * cwwc);

        dyad1s_pair(&devs, &i) * (-2.0 / 3.0) + (i4 - ixi / 3.0) * (4.0 / 3.0 * ji * wc) + cw
    }

    fn dev_strain_energy_density(&self, pt: &MaterialPoint) -> f64 {
        let (_, _, i1, i2) = Self::invariants(pt);
        self.c1 * (i1 - 3.0) + self.c2 * (i2 - 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::testing::{check_tangent, point_with, sheared};
    use crate::material::{Material, UncoupledSolid};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_validation() {
        assert!(MooneyRivlin::new(0.0, 0.0, 1.0).is_err());
        assert!(MooneyRivlin::new(1.0, 0.0, -1.0).is_err());
        assert!(MooneyRivlin::new(-0.1, 0.5, 10.0).is_ok());
    }

    #[test]
    fn test_deviatoric_stress_is_traceless() {
        let m = MooneyRivlin::new(1.0, 0.3, 50.0).unwrap();
        let pt = point_with(sheared());
        assert_relative_eq!(m.dev_stress(&pt).trace(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_volumetric_stretch_only_produces_pressure() {
        let m = UncoupledSolid::new(Box::new(MooneyRivlin::new(1.0, 0.3, 50.0).unwrap()));
        let pt = point_with(Mat3::identity() * 1.05);
        let s = m.stress(&pt);
        let j: f64 = 1.05_f64.powi(3);
        assert_relative_eq!(s, Mat3::identity() * (50.0 * j.ln() / j), epsilon = 1e-12);
    }

    #[test]
    fn test_neo_hookean_limit() {
        // c2 = 0: σ̃ = 2 c1 / J dev(B̃)
        let m = MooneyRivlin::new(0.8, 0.0, 0.0).unwrap();
        let f = Mat3::from_diagonal(&Vector3::new(1.2, 0.9, 1.0));
        let pt = point_with(f);
        let expected = deviator(&pt.elastic.dev_left_cauchy_green()) * (1.6 / pt.elastic.j);
        assert_relative_eq!(m.dev_stress(&pt), expected, epsilon = 1e-14);
    }

    #[test]
    fn test_tangent_matches_stress_rate() {
        let m = UncoupledSolid::new(Box::new(MooneyRivlin::new(1.0, 0.4, 20.0).unwrap()));
        check_tangent(&|p| m.stress(p), &|p| m.tangent(p), &point_with(sheared()), 1e-6);
    }
}
