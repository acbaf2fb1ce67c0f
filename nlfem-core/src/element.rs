//! Element interpolation for solid domains and contact facets.
//!
//! A [`SolidShape`] describes one element family: its nodes, integration
//! rule and shape functions in natural coordinates. Domains evaluate the
//! shape once into a [`ShapeTable`] and reuse it for every element.
//!
//! # Submodules
//!
//! - [`gauss`] - Gauss quadrature rules for numerical integration
//! - [`hex8`] - trilinear brick
//! - [`tet4`] - linear tetrahedron
//! - [`facet`] - Quad4/Tri3 surface facets used by contact

use nalgebra::{Matrix3, Vector3};

use crate::error::{Error, Result};
use crate::mesh::ElementType;
use crate::types::Point3;

pub mod facet;
pub mod gauss;
pub mod hex8;
pub mod tet4;

pub use facet::FacetKind;
pub use gauss::{gauss_1d, gauss_hex, gauss_quad, gauss_tet, gauss_tri, GaussPoint};
pub use hex8::Hex8;
pub use tet4::Tet4;

/// Interpolation of a 3D solid element family.
///
/// Shapes must be thread-safe (Send + Sync) since they are shared by the
/// parallel element loops.
pub trait SolidShape: Send + Sync {
    /// Number of nodes in this element.
    fn n_nodes(&self) -> usize;

    /// Integration rule. The count is fixed for the element's lifetime.
    fn integration_points(&self) -> Vec<GaussPoint>;

    /// Shape function values at an integration point.
    fn shape_functions(&self, gp: &GaussPoint) -> Vec<f64>;

    /// Shape function derivatives with respect to natural coordinates.
    fn shape_derivatives(&self, gp: &GaussPoint) -> Vec<Vector3<f64>>;
}

/// Create the shape of a solid element type.
pub fn solid_shape(element_type: ElementType) -> Box<dyn SolidShape> {
    match element_type {
        ElementType::Hex8 => Box::new(Hex8),
        ElementType::Tet4 => Box::new(Tet4),
    }
}

/// Shape functions and natural derivatives tabulated at every integration
/// point of one element family.
#[derive(Debug, Clone)]
pub struct ShapeTable {
    pub weights: Vec<f64>,
    pub values: Vec<Vec<f64>>,
    pub derivatives: Vec<Vec<Vector3<f64>>>,
}

/// Material gradients of the shape functions at one integration point.
#[derive(Debug, Clone)]
pub struct ReferenceGradients {
    /// ∇_X N_a for every node.
    pub gradients: Vec<Vector3<f64>>,
    /// Reference volume weight det(J0) * w.
    pub dv0: f64,
}

impl ShapeTable {
    pub fn new(shape: &dyn SolidShape) -> Self {
        let points = shape.integration_points();
        Self {
            weights: points.iter().map(|gp| gp.weight).collect(),
            values: points.iter().map(|gp| shape.shape_functions(gp)).collect(),
            derivatives: points.iter().map(|gp| shape.shape_derivatives(gp)).collect(),
        }
    }

    pub fn n_points(&self) -> usize {
        self.weights.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    /// Jacobian at integration point `gp`.
    ///
    /// J = [∂x/∂ξ  ∂y/∂ξ  ∂z/∂ξ]
    ///     [∂x/∂η  ∂y/∂η  ∂z/∂η]
    ///     [∂x/∂ζ  ∂y/∂ζ  ∂z/∂ζ]
    pub fn jacobian(&self, gp: usize, coords: &[Point3]) -> Matrix3<f64> {
        self.derivatives[gp]
            .iter()
            .zip(coords)
            .fold(Matrix3::zeros(), |j, (dn, x)| j + dn * x.transpose())
    }

    /// Gradients with respect to `coords` at integration point `gp`.
    ///
    /// `element` is only used to label a degenerate-element error.
    pub fn gradients(&self, gp: usize, coords: &[Point3], element: usize) -> Result<ReferenceGradients> {
        let j = self.jacobian(gp, coords);
        let det_j = j.determinant();
        if det_j <= 0.0 {
            return Err(Error::DegenerateElement {
                element,
                jacobian: det_j,
            });
        }
        let j_inv = j.try_inverse().ok_or(Error::DegenerateElement {
            element,
            jacobian: det_j,
        })?;

        // [dN/dx, dN/dy, dN/dz]^T = J^(-1) * [dN/dξ, dN/dη, dN/dζ]^T
        Ok(ReferenceGradients {
            gradients: self.derivatives[gp].iter().map(|dn| j_inv * dn).collect(),
            dv0: det_j * self.weights[gp],
        })
    }
}
