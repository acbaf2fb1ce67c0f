//! 4-node tetrahedron (Tet4) element.
//!
//! Linear shape functions N_i = L_i in barycentric coordinates, with natural
//! coordinates (ξ, η, ζ) = (L2, L3, L4):
//! - Node 1: (0, 0, 0) -> N1 = 1 - ξ - η - ζ
//! - Node 2: (1, 0, 0) -> N2 = ξ
//! - Node 3: (0, 1, 0) -> N3 = η
//! - Node 4: (0, 0, 1) -> N4 = ζ
//!
//! The deformation gradient is constant, so one integration point at the
//! centroid is exact. Volumetric locking makes it a poor choice for nearly
//! incompressible materials.

use nalgebra::Vector3;

use crate::element::gauss::{gauss_tet, GaussPoint};
use crate::element::SolidShape;

/// 4-node tetrahedral element.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tet4;

impl SolidShape for Tet4 {
    fn n_nodes(&self) -> usize {
        4
    }

    fn integration_points(&self) -> Vec<GaussPoint> {
        gauss_tet(1)
    }

    fn shape_functions(&self, gp: &GaussPoint) -> Vec<f64> {
        let [_, xi, eta, zeta] = gp.coords;
        vec![1.0 - xi - eta - zeta, xi, eta, zeta]
    }

    fn shape_derivatives(&self, _gp: &GaussPoint) -> Vec<Vector3<f64>> {
        vec![
            Vector3::new(-1.0, -1.0, -1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ShapeTable;
    use crate::types::Point3;
    use approx::assert_relative_eq;

    #[test]
    fn test_centroid_values() {
        let n = Tet4.shape_functions(&gauss_tet(1)[0]);
        for v in n {
            assert_relative_eq!(v, 0.25, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_volume() {
        let coords = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 2.0),
        ];
        let table = ShapeTable::new(&Tet4);
        let g = table.gradients(0, &coords, 0).unwrap();
        assert_relative_eq!(g.dv0, 8.0 / 6.0, epsilon = 1e-14);
        // gradients of a partition of unity sum to zero
        let sum: Vector3<f64> = g.gradients.iter().sum();
        assert_relative_eq!(sum.norm(), 0.0, epsilon = 1e-14);
        assert_relative_eq!(g.gradients[1], Vector3::new(0.5, 0.0, 0.0), epsilon = 1e-14);
    }
}
