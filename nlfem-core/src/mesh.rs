//! Mesh data structure.
//!
//! Stores reference nodal coordinates and solid element connectivity.
//! Contact surfaces are facet sets built on the same nodes (see
//! [`crate::contact::Surface`]).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Point3;

/// Element connectivity - node indices for an element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementConnectivity {
    /// Element type identifier.
    pub element_type: ElementType,
    /// Node indices (0-based).
    pub nodes: Vec<usize>,
}

/// Supported solid element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 4-node tetrahedron (linear).
    Tet4,
    /// 8-node hexahedron (trilinear).
    Hex8,
}

impl ElementType {
    /// Number of nodes for this element type.
    pub fn n_nodes(self) -> usize {
        match self {
            ElementType::Tet4 => 4,
            ElementType::Hex8 => 8,
        }
    }

    /// Number of integration points.
    pub fn n_integration_points(self) -> usize {
        match self {
            ElementType::Tet4 => 1,
            ElementType::Hex8 => 8,
        }
    }
}

/// Finite element mesh.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Reference nodal coordinates.
    nodes: Vec<Point3>,
    /// Element connectivity.
    elements: Vec<ElementConnectivity>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the mesh, returning its index.
    pub fn add_node(&mut self, point: Point3) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(point);
        idx
    }

    /// Add multiple nodes at once.
    pub fn add_nodes(&mut self, points: impl IntoIterator<Item = Point3>) {
        self.nodes.extend(points);
    }

    /// Add an element to the mesh.
    pub fn add_element(&mut self, element_type: ElementType, nodes: Vec<usize>) -> Result<usize> {
        if nodes.len() != element_type.n_nodes() {
            return Err(Error::Mesh(format!(
                "element type {:?} requires {} nodes, got {}",
                element_type,
                element_type.n_nodes(),
                nodes.len()
            )));
        }

        if let Some(&bad) = nodes.iter().find(|&&n| n >= self.nodes.len()) {
            return Err(Error::Mesh(format!(
                "node index {} out of bounds (mesh has {} nodes)",
                bad,
                self.nodes.len()
            )));
        }

        let idx = self.elements.len();
        self.elements.push(ElementConnectivity {
            element_type,
            nodes,
        });
        Ok(idx)
    }

    /// Number of nodes in the mesh.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements in the mesh.
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    /// Reference nodal coordinates.
    pub fn nodes(&self) -> &[Point3] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> Option<&Point3> {
        self.nodes.get(idx)
    }

    pub fn elements(&self) -> &[ElementConnectivity] {
        &self.elements
    }

    pub fn element(&self, idx: usize) -> Option<&ElementConnectivity> {
        self.elements.get(idx)
    }

    /// Reference coordinates of an element's nodes.
    pub fn element_coords(&self, elem_idx: usize) -> Option<Vec<Point3>> {
        let elem = self.elements.get(elem_idx)?;
        Some(elem.nodes.iter().map(|&i| self.nodes[i]).collect())
    }

    /// Indices of the nodes whose reference position satisfies `predicate`.
    pub fn nodes_where(&self, predicate: impl Fn(&Point3) -> bool) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, p)| predicate(p))
            .map(|(i, _)| i)
            .collect()
    }

    /// Compute mesh bounding box.
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        let first = *self.nodes.first()?;
        Some(self.nodes[1..].iter().fold((first, first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        }))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Add an axis-aligned Hex8 brick and return its element index.
    pub fn add_brick(mesh: &mut Mesh, origin: Point3, size: f64) -> usize {
        let first = mesh.n_nodes();
        for (x, y, z) in [
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 1.0),
            (0.0, 1.0, 1.0),
        ] {
            mesh.add_node(origin + Point3::new(x, y, z) * size);
        }
        mesh.add_element(ElementType::Hex8, (first..first + 8).collect())
            .unwrap()
    }

    pub fn unit_cube() -> Mesh {
        let mut mesh = Mesh::new();
        add_brick(&mut mesh, Point3::zeros(), 1.0);
        mesh
    }

    pub fn unit_tet() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_nodes([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ]);
        mesh.add_element(ElementType::Tet4, vec![0, 1, 2, 3])
            .unwrap();
        mesh
    }
}
