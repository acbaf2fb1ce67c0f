//! Compressible neo-Hookean solid.
//!
//! W = μ/2 (I1 - 3) - μ ln J + λ/2 (ln J)²
//!
//! with Lamé parameters derived from Young's modulus and Poisson's ratio.
//! At F = I the tangent reduces to the isotropic linear elastic matrix.

use crate::error::{Error, Result};
use crate::material::params::{MaterialSpec, ParamDecl, ParamRange, DENSITY};
use crate::material::registry::MaterialRegistry;
use crate::material::{Material, MaterialPoint};
use crate::types::{identity4, identity_dyad, Mat3, Tangent};

pub const KIND: &str = "neo-Hookean";

const E: ParamDecl = ParamDecl::required("E", ParamRange::Greater(0.0));
const V: ParamDecl = ParamDecl::required("v", ParamRange::Open(-1.0, 0.5));

/// Compressible neo-Hookean material.
#[derive(Debug, Clone, PartialEq)]
pub struct NeoHookean {
    /// Young's modulus.
    pub youngs_modulus: f64,
    /// Poisson's ratio (dimensionless).
    pub poissons_ratio: f64,
    /// Reference mass density.
    pub density: f64,
}

impl NeoHookean {
    /// Create a neo-Hookean material.
    ///
    /// # Errors
    ///
    /// Returns error if E ≤ 0 or ν is outside (-1, 0.5).
    pub fn new(youngs_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        if !(youngs_modulus > 0.0) {
            return Err(Error::invalid_material("E", "Young's modulus must be positive"));
        }
        if poissons_ratio <= -1.0 || poissons_ratio >= 0.5 {
            return Err(Error::invalid_material("v", "Poisson's ratio must be in range (-1, 0.5)"));
        }
        Ok(Self {
            youngs_modulus,
            poissons_ratio,
            density: 1.0,
        })
    }

    /// Set the mass density.
    pub fn with_density(mut self, density: f64) -> Result<Self> {
        if !(density > 0.0) {
            return Err(Error::invalid_material("density", "density must be positive"));
        }
        self.density = density;
        Ok(self)
    }

    pub(crate) fn from_spec(spec: &MaterialSpec, _registry: &MaterialRegistry) -> Result<Box<dyn Material>> {
        spec.check_known(&[E, V, DENSITY])?;
        let material = Self::new(spec.value(&E)?, spec.value(&V)?)?.with_density(spec.value(&DENSITY)?)?;
        Ok(Box::new(material))
    }

    /// Shear modulus G = E / (2(1 + ν)).
    pub fn shear_modulus(&self) -> f64 {
        self.youngs_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Bulk modulus K = E / (3(1 - 2ν)).
    pub fn bulk_modulus(&self) -> f64 {
        self.youngs_modulus / (3.0 * (1.0 - 2.0 * self.poissons_ratio))
    }

    /// Lamé's first parameter λ = Eν / ((1+ν)(1-2ν)).
    pub fn lame_lambda(&self) -> f64 {
        let e = self.youngs_modulus;
        let nu = self.poissons_ratio;
        e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu))
    }

    /// Lamé's second parameter μ = G.
    pub fn lame_mu(&self) -> f64 {
        self.shear_modulus()
    }
}

impl Material for NeoHookean {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn density(&self) -> f64 {
        self.density
    }

    fn stress(&self, pt: &MaterialPoint) -> Mat3 {
        let j = pt.elastic.j;
        let b = pt.elastic.left_cauchy_green();
        let (mu, lam) = (self.lame_mu(), self.lame_lambda());
        let i = Mat3::identity();
        (b - i) * (mu / j) + i * (lam * j.ln() / j)
    }

    fn tangent(&self, pt: &MaterialPoint) -> Tangent {
        let j = pt.elastic.j;
        let (mu, lam) = (self.lame_mu(), self.lame_lambda());
        let lam1 = lam / j;
        let mu1 = (mu - lam * j.ln()) / j;
        identity_dyad() * lam1 + identity4() * (2.0 * mu1)
    }

    fn strain_energy_density(&self, pt: &MaterialPoint) -> f64 {
        let lnj = pt.elastic.j.ln();
        let i1 = pt.elastic.right_cauchy_green().trace();
        let (mu, lam) = (self.lame_mu(), self.lame_lambda());
        0.5 * mu * (i1 - 3.0) - mu * lnj + 0.5 * lam * lnj * lnj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::testing::{check_tangent, point_with, sheared};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix6, Vector3};

    /// Isotropic linear elastic matrix in Voigt notation.
    fn small_strain_tangent(m: &NeoHookean) -> Tangent {
        let e = m.youngs_modulus;
        let nu = m.poissons_ratio;
        let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let c11 = factor * (1.0 - nu);
        let c12 = factor * nu;
        let c44 = factor * (1.0 - 2.0 * nu) / 2.0;
        Matrix6::new(
            c11, c12, c12, 0.0, 0.0, 0.0,
            c12, c11, c12, 0.0, 0.0, 0.0,
            c12, c12, c11, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, c44, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0, c44, 0.0,
            0.0, 0.0, 0.0, 0.0, 0.0, c44,
        )
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(NeoHookean::new(-1.0, 0.3).is_err());
        assert!(NeoHookean::new(1.0, 0.5).is_err());
        assert!(NeoHookean::new(1.0, -1.0).is_err());
        assert!(NeoHookean::new(1.0, 0.3).unwrap().with_density(0.0).is_err());
    }

    #[test]
    fn test_reference_state_is_stress_free() {
        let m = NeoHookean::new(200e9, 0.3).unwrap();
        let pt = MaterialPoint::new();
        assert_relative_eq!(m.stress(&pt).norm(), 0.0);
        assert_relative_eq!(m.strain_energy_density(&pt), 0.0);
        assert_relative_eq!(m.tangent(&pt), small_strain_tangent(&m), max_relative = 1e-12);
    }

    #[test]
    fn test_elastic_constants() {
        let m = NeoHookean::new(200e9, 0.3).unwrap();
        let g = m.shear_modulus();
        let k = m.bulk_modulus();
        assert_relative_eq!(g, 200e9 / 2.6, epsilon = 1.0);
        assert_relative_eq!(k, 200e9 / 1.2, epsilon = 1.0);
        assert_relative_eq!(9.0 * k * g / (3.0 * k + g), 200e9, epsilon = 1.0);
    }

    #[test]
    fn test_uniaxial_stress() {
        let m = NeoHookean::new(3.0, 0.25).unwrap();
        let f = Mat3::from_diagonal(&Vector3::new(1.1, 1.0, 1.0));
        let s = m.stress(&point_with(f));
        let (mu, lam) = (m.lame_mu(), m.lame_lambda());
        let j: f64 = 1.1;
        assert_relative_eq!(s[(0, 0)], mu / j * (1.21 - 1.0) + lam * j.ln() / j, epsilon = 1e-14);
        assert_relative_eq!(s[(1, 1)], lam * j.ln() / j, epsilon = 1e-14);
        assert_relative_eq!(s[(0, 1)], 0.0);
    }

    #[test]
    fn test_tangent_matches_stress_rate() {
        let m = NeoHookean::new(10.0, 0.35).unwrap();
        check_tangent(&|p| m.stress(p), &|p| m.tangent(p), &point_with(sheared()), 1e-6);
    }
}
