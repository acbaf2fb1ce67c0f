//! Surface facets for contact.
//!
//! Facet nodes are ordered counterclockwise seen from the side the outward
//! normal points to. Natural coordinates are (r, s) ∈ [-1, 1]² for Quad4 and
//! (r, s) with r, s ≥ 0, r + s ≤ 1 for Tri3.

use serde::{Deserialize, Serialize};

use crate::element::gauss::{gauss_quad, gauss_tri};

const R: [f64; 4] = [-1.0, 1.0, 1.0, -1.0];
const S: [f64; 4] = [-1.0, -1.0, 1.0, 1.0];

/// Facet family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacetKind {
    Quad4,
    Tri3,
}

impl FacetKind {
    pub fn n_nodes(self) -> usize {
        match self {
            FacetKind::Quad4 => 4,
            FacetKind::Tri3 => 3,
        }
    }

    /// Shape functions at (r, s); unused trailing entries are zero.
    pub fn shape_functions(self, r: f64, s: f64) -> [f64; 4] {
        match self {
            FacetKind::Quad4 => {
                std::array::from_fn(|i| 0.25 * (1.0 + R[i] * r) * (1.0 + S[i] * s))
            }
            FacetKind::Tri3 => [1.0 - r - s, r, s, 0.0],
        }
    }

    /// Derivatives (∂N/∂r, ∂N/∂s) at (r, s).
    pub fn shape_derivatives(self, r: f64, s: f64) -> ([f64; 4], [f64; 4]) {
        match self {
            FacetKind::Quad4 => (
                std::array::from_fn(|i| 0.25 * R[i] * (1.0 + S[i] * s)),
                std::array::from_fn(|i| 0.25 * (1.0 + R[i] * r) * S[i]),
            ),
            FacetKind::Tri3 => ([-1.0, 1.0, 0.0, 0.0], [-1.0, 0.0, 1.0, 0.0]),
        }
    }

    /// Mixed derivatives ∂²N/∂r∂s. The pure second derivatives vanish for
    /// both families and the mixed ones are constant.
    pub fn mixed_derivatives(self) -> [f64; 4] {
        match self {
            FacetKind::Quad4 => std::array::from_fn(|i| 0.25 * R[i] * S[i]),
            FacetKind::Tri3 => [0.0; 4],
        }
    }

    /// Whether (r, s) lies on the facet, widened by `tol`.
    pub fn contains(self, r: f64, s: f64, tol: f64) -> bool {
        match self {
            FacetKind::Quad4 => r.abs() <= 1.0 + tol && s.abs() <= 1.0 + tol,
            FacetKind::Tri3 => r >= -tol && s >= -tol && r + s <= 1.0 + tol,
        }
    }

    /// Closest natural coordinates on the facet.
    pub fn clamp(self, r: f64, s: f64) -> (f64, f64) {
        match self {
            FacetKind::Quad4 => (r.clamp(-1.0, 1.0), s.clamp(-1.0, 1.0)),
            FacetKind::Tri3 => {
                let (r, s) = (r.max(0.0), s.max(0.0));
                let excess = r + s - 1.0;
                if excess > 0.0 {
                    let (r, s) = ((r - 0.5 * excess).max(0.0), (s - 0.5 * excess).max(0.0));
                    let total = r + s;
                    (r / total, s / total)
                } else {
                    (r, s)
                }
            }
        }
    }

    pub fn centroid(self) -> (f64, f64) {
        match self {
            FacetKind::Quad4 => (0.0, 0.0),
            FacetKind::Tri3 => (1.0 / 3.0, 1.0 / 3.0),
        }
    }

    /// Area integration rule as ((r, s), weight) pairs.
    pub fn integration_points(self) -> Vec<((f64, f64), f64)> {
        match self {
            FacetKind::Quad4 => gauss_quad(2)
                .into_iter()
                .map(|gp| ((gp.xi(), gp.eta()), gp.weight))
                .collect(),
            FacetKind::Tri3 => gauss_tri(3)
                .into_iter()
                .map(|gp| ((gp.coords[1], gp.coords[2]), gp.weight))
                .collect(),
        }
    }
}
