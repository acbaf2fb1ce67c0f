//! Core data types for finite-strain solid mechanics.
//!
//! This module defines the small dense tensors used throughout nlfem:
//! - Geometric primitives (points, vectors, second-order tensors)
//! - Stress and strain tensors in Voigt notation
//! - Fourth-order spatial elasticity tensors and the dyadic products
//!   used to build them

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = Vector3<f64>;

/// A 3D vector (displacement, force, etc.).
pub type Vec3 = Vector3<f64>;

/// A second-order tensor (deformation gradient, Cauchy stress, ...).
pub type Mat3 = Matrix3<f64>;

/// Fourth-order tensor with minor and major symmetries in Voigt notation.
///
/// Rows and columns follow the component order of [`VOIGT`]. Shear columns
/// act on engineering shear strains, matching the strain-displacement rows
/// [dx,0,0] [0,dy,0] [0,0,dz] [dy,dx,0] [0,dz,dy] [dz,0,dx].
pub type Tangent = Matrix6<f64>;

/// Tensor index pairs for the Voigt components xx, yy, zz, xy, yz, xz.
pub const VOIGT: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (0, 2)];

/// Symmetric stress tensor in Voigt notation.
///
/// Components are ordered as: [σ_xx, σ_yy, σ_zz, τ_xy, τ_yz, τ_xz]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressTensor(pub Vector6<f64>);

impl StressTensor {
    /// Create a new stress tensor from Voigt components.
    pub fn new(components: [f64; 6]) -> Self {
        Self(Vector6::from_row_slice(&components))
    }

    /// Zero stress state.
    pub fn zero() -> Self {
        Self(Vector6::zeros())
    }

    /// Collect the Voigt components of a symmetric 3x3 tensor.
    pub fn from_matrix(s: &Mat3) -> Self {
        Self(Vector6::from_fn(|i, _| {
            let (a, b) = VOIGT[i];
            s[(a, b)]
        }))
    }

    /// Compute von Mises equivalent stress.
    pub fn von_mises(&self) -> f64 {
        let s = &self.0;
        let term1 = (s[0] - s[1]).powi(2) + (s[1] - s[2]).powi(2) + (s[2] - s[0]).powi(2);
        let term2 = 6.0 * (s[3].powi(2) + s[4].powi(2) + s[5].powi(2));
        ((term1 + term2) / 2.0).sqrt()
    }

    /// Compute hydrostatic (mean) stress.
    pub fn hydrostatic(&self) -> f64 {
        (self.0[0] + self.0[1] + self.0[2]) / 3.0
    }

    /// Extract the full 3x3 symmetric stress matrix.
    pub fn to_matrix(&self) -> Mat3 {
        let s = &self.0;
        Matrix3::new(
            s[0], s[3], s[5],
            s[3], s[1], s[4],
            s[5], s[4], s[2],
        )
    }
}

/// Symmetric strain tensor in Voigt notation.
///
/// Components are ordered as: [ε_xx, ε_yy, ε_zz, γ_xy, γ_yz, γ_xz]
/// where γ = 2ε for engineering shear strain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrainTensor(pub Vector6<f64>);

impl StrainTensor {
    /// Create a new strain tensor from Voigt components.
    pub fn new(components: [f64; 6]) -> Self {
        Self(Vector6::from_row_slice(&components))
    }

    /// Green-Lagrange strain E = (FᵀF - I)/2 of a deformation gradient.
    pub fn green_lagrange(f: &Mat3) -> Self {
        let e = (f.transpose() * f - Mat3::identity()) * 0.5;
        Self::new([
            e[(0, 0)],
            e[(1, 1)],
            e[(2, 2)],
            2.0 * e[(0, 1)],
            2.0 * e[(1, 2)],
            2.0 * e[(0, 2)],
        ])
    }

    /// Compute volumetric strain.
    pub fn volumetric(&self) -> f64 {
        self.0[0] + self.0[1] + self.0[2]
    }

    /// Extract the full 3x3 symmetric strain matrix.
    pub fn to_matrix(&self) -> Mat3 {
        let e = &self.0;
        // Note: off-diagonal terms are γ/2 = ε
        Matrix3::new(
            e[0],       e[3] / 2.0, e[5] / 2.0,
            e[3] / 2.0, e[1],       e[4] / 2.0,
            e[5] / 2.0, e[4] / 2.0, e[2],
        )
    }
}

/// Deviatoric part of a second-order tensor.
pub fn deviator(a: &Mat3) -> Mat3 {
    a - Mat3::identity() * (a.trace() / 3.0)
}

/// A ⊗ A for a symmetric A.
pub fn dyad1s(a: &Mat3) -> Tangent {
    Tangent::from_fn(|i, j| {
        let (p, q) = VOIGT[i];
        let (r, s) = VOIGT[j];
        a[(p, q)] * a[(r, s)]
    })
}

/// A ⊗ B + B ⊗ A for symmetric A and B.
pub fn dyad1s_pair(a: &Mat3, b: &Mat3) -> Tangent {
    Tangent::from_fn(|i, j| {
        let (p, q) = VOIGT[i];
        let (r, s) = VOIGT[j];
        a[(p, q)] * b[(r, s)] + b[(p, q)] * a[(r, s)]
    })
}

/// Symmetrized A ⊙ A with components (A_ik A_jl + A_il A_jk)/2.
pub fn dyad4s(a: &Mat3) -> Tangent {
    Tangent::from_fn(|m, n| {
        let (i, j) = VOIGT[m];
        let (k, l) = VOIGT[n];
        0.5 * (a[(i, k)] * a[(j, l)] + a[(i, l)] * a[(j, k)])
    })
}

/// I ⊗ I.
pub fn identity_dyad() -> Tangent {
    dyad1s(&Mat3::identity())
}

/// Symmetric fourth-order identity.
pub fn identity4() -> Tangent {
    dyad4s(&Mat3::identity())
}

/// Contract a tangent with a symmetric second-order tensor, c : A.
pub fn contract(c: &Tangent, a: &Mat3) -> Mat3 {
    let v = Vector6::new(
        a[(0, 0)],
        a[(1, 1)],
        a[(2, 2)],
        2.0 * a[(0, 1)],
        2.0 * a[(1, 2)],
        2.0 * a[(0, 2)],
    );
    StressTensor(c * v).to_matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_von_mises_uniaxial() {
        let stress = StressTensor::new([100.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(stress.von_mises(), 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_von_mises_pure_shear() {
        // von Mises = √3 * τ
        let stress = StressTensor::new([0.0, 0.0, 0.0, 100.0, 0.0, 0.0]);
        assert_relative_eq!(stress.von_mises(), 100.0 * 3.0_f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_matrix_round_trip() {
        let s = Matrix3::new(1.0, 4.0, 6.0, 4.0, 2.0, 5.0, 6.0, 5.0, 3.0);
        let voigt = StressTensor::from_matrix(&s);
        assert_eq!(voigt.0.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(voigt.to_matrix(), s);
    }

    #[test]
    fn test_green_lagrange_uniaxial() {
        let f = Matrix3::from_diagonal(&Vector3::new(1.1, 1.0, 1.0));
        let e = StrainTensor::green_lagrange(&f);
        assert_relative_eq!(e.0[0], 0.105, epsilon = 1e-12);
        assert_relative_eq!(e.volumetric(), 0.105, epsilon = 1e-12);
    }

    #[test]
    fn test_identity4_contracts_to_identity_map() {
        let a = Matrix3::new(1.0, 0.2, -0.3, 0.2, 2.0, 0.7, -0.3, 0.7, 3.0);
        let b = contract(&identity4(), &a);
        assert_relative_eq!(b, a, epsilon = 1e-14);
    }

    #[test]
    fn test_dyad4s_of_identity_has_half_shear_diagonal() {
        let i4 = identity4();
        assert_relative_eq!(i4[(0, 0)], 1.0);
        assert_relative_eq!(i4[(3, 3)], 0.5);
        assert_relative_eq!(i4[(0, 1)], 0.0);
    }

    #[test]
    fn test_dyad1s_pair_is_symmetric() {
        let a = Matrix3::new(1.0, 0.5, 0.0, 0.5, 2.0, 0.1, 0.0, 0.1, 3.0);
        let i = Mat3::identity();
        let t = dyad1s_pair(&a, &i);
        assert_relative_eq!(t, t.transpose(), epsilon = 1e-14);
        assert_relative_eq!(t[(0, 1)], a[(0, 0)] + a[(1, 1)]);
        // trace contraction: (A⊗I + I⊗A) : I = A tr(I) + I tr(A)
        let c = contract(&t, &i);
        assert_relative_eq!(c, a * 3.0 + i * a.trace(), epsilon = 1e-12);
    }
}
