//! 8-node hexahedron (Hex8) element.
//!
//! Trilinear shape functions in natural coordinates (ξ, η, ζ) ∈ [-1, 1]³:
//! ```text
//! N_i = (1 + ξ_i*ξ)(1 + η_i*η)(1 + ζ_i*ζ) / 8
//! ```
//! integrated with the 2×2×2 Gauss rule.
//!
//! # Node Numbering
//!
//! ```text
//!        7-------6
//!       /|      /|
//!      / |     / |
//!     4-------5  |
//!     |  3----|--2
//!     | /     | /
//!     |/      |/
//!     0-------1
//! ```

use nalgebra::Vector3;

use crate::element::gauss::{gauss_hex, GaussPoint};
use crate::element::SolidShape;

/// Natural coordinates of the 8 nodes.
const XI: [f64; 8] = [-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0];
const ETA: [f64; 8] = [-1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0];
const ZETA: [f64; 8] = [-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0];

/// 8-node hexahedral element (trilinear brick).
#[derive(Debug, Clone, Copy, Default)]
pub struct Hex8;

impl SolidShape for Hex8 {
    fn n_nodes(&self) -> usize {
        8
    }

    fn integration_points(&self) -> Vec<GaussPoint> {
        gauss_hex(2)
    }

    fn shape_functions(&self, gp: &GaussPoint) -> Vec<f64> {
        let (xi, eta, zeta) = (gp.xi(), gp.eta(), gp.zeta());
        (0..8)
            .map(|i| 0.125 * (1.0 + XI[i] * xi) * (1.0 + ETA[i] * eta) * (1.0 + ZETA[i] * zeta))
            .collect()
    }

    fn shape_derivatives(&self, gp: &GaussPoint) -> Vec<Vector3<f64>> {
        let (xi, eta, zeta) = (gp.xi(), gp.eta(), gp.zeta());
        (0..8)
            .map(|i| {
                let a = 1.0 + XI[i] * xi;
                let b = 1.0 + ETA[i] * eta;
                let c = 1.0 + ZETA[i] * zeta;
                Vector3::new(XI[i] * b * c, a * ETA[i] * c, a * b * ZETA[i]) * 0.125
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ShapeTable;
    use crate::types::Point3;
    use approx::assert_relative_eq;

    fn unit_cube() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn test_partition_of_unity() {
        let gp = GaussPoint::new([0.3, -0.7, 0.1, 0.0], 1.0);
        let n = Hex8.shape_functions(&gp);
        let dn = Hex8.shape_derivatives(&gp);
        assert_relative_eq!(n.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        let dsum: Vector3<f64> = dn.iter().sum();
        assert_relative_eq!(dsum.norm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_nodal_interpolation() {
        for i in 0..8 {
            let gp = GaussPoint::new([XI[i], ETA[i], ZETA[i], 0.0], 1.0);
            let n = Hex8.shape_functions(&gp);
            for (j, &nj) in n.iter().enumerate() {
                assert_relative_eq!(nj, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_unit_cube_jacobian_and_volume() {
        let table = ShapeTable::new(&Hex8);
        let coords = unit_cube();
        let mut volume = 0.0;
        for gp in 0..table.n_points() {
            let j = table.jacobian(gp, &coords);
            assert_relative_eq!(j, nalgebra::Matrix3::identity() * 0.5, epsilon = 1e-14);
            volume += table.gradients(gp, &coords, 0).unwrap().dv0;
        }
        assert_relative_eq!(volume, 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_scaled_brick_volume() {
        let coords: Vec<Point3> = unit_cube()
            .iter()
            .map(|p| Point3::new(2.0 * p[0], 3.0 * p[1], 0.5 * p[2]))
            .collect();
        let table = ShapeTable::new(&Hex8);
        let volume: f64 = (0..8)
            .map(|gp| table.gradients(gp, &coords, 0).unwrap().dv0)
            .sum();
        assert_relative_eq!(volume, 3.0, epsilon = 1e-12);
    }
}
