//! Contact surfaces and closest-point projection.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use crate::element::FacetKind;
use crate::error::{Error, Result};
use crate::types::{Point3, Vec3};

const MAX_PROJECTION_ITERATIONS: usize = 10;
const PROJECTION_TOLERANCE: f64 = 1e-12;

/// One surface facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub kind: FacetKind,
    pub nodes: Vec<usize>,
}

/// Closest point of a surface to a query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub facet: usize,
    pub r: f64,
    pub s: f64,
    /// Projected point ρ.
    pub point: Point3,
    /// Unit outward normal ν at ρ.
    pub normal: Vec3,
    /// Covariant tangents (x_r, x_s) at ρ.
    pub tangents: [Vec3; 2],
    /// Mixed derivative x_rs of the facet.
    pub twist: Vec3,
}

/// A set of facets on mesh nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    name: String,
    facets: Vec<Facet>,
    /// Distinct surface nodes in ascending order.
    nodes: Vec<usize>,
    /// Tributary reference area of each entry of `nodes`.
    areas: Vec<f64>,
}

impl Surface {
    /// # Errors
    ///
    /// Fails on an empty surface or a facet with the wrong node count.
    pub fn new(name: impl Into<String>, facets: Vec<Facet>) -> Result<Self> {
        let name = name.into();
        if facets.is_empty() {
            return Err(Error::Mesh(format!("surface '{name}' has no facets")));
        }
        if let Some((i, f)) = facets
            .iter()
            .enumerate()
            .find(|(_, f)| f.nodes.len() != f.kind.n_nodes())
        {
            return Err(Error::Mesh(format!(
                "facet {i} of surface '{name}' is {:?} with {} nodes",
                f.kind,
                f.nodes.len()
            )));
        }
        let mut nodes: Vec<usize> = facets.iter().flat_map(|f| f.nodes.iter().copied()).collect();
        nodes.sort_unstable();
        nodes.dedup();
        Ok(Self {
            areas: vec![0.0; nodes.len()],
            name,
            facets,
            nodes,
        })
    }

    /// Surface of Quad4 facets.
    pub fn from_quads(name: impl Into<String>, quads: &[[usize; 4]]) -> Result<Self> {
        let facets = quads
            .iter()
            .map(|q| Facet {
                kind: FacetKind::Quad4,
                nodes: q.to_vec(),
            })
            .collect();
        Self::new(name, facets)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Reference areas aligned with [`nodes`](Self::nodes).
    pub fn node_areas(&self) -> &[f64] {
        &self.areas
    }

    /// Total reference area.
    pub fn area(&self) -> f64 {
        self.areas.iter().sum()
    }

    /// Check node indices against a mesh of `n_nodes` nodes.
    pub fn validate(&self, n_nodes: usize) -> Result<()> {
        match self.nodes.last() {
            Some(&n) if n >= n_nodes => Err(Error::Mesh(format!(
                "surface '{}' references node {n} of {n_nodes}",
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// Integrate the tributary nodal areas on the reference configuration.
    pub fn initialize(&mut self, reference: &[Point3]) -> Result<()> {
        self.validate(reference.len())?;
        let mut areas = vec![0.0; self.nodes.len()];
        for f in 0..self.facets.len() {
            let facet = &self.facets[f];
            for ((r, s), w) in facet.kind.integration_points() {
                let (_, xr, xs) = self.geometry(f, r, s, reference);
                let da = xr.cross(&xs).norm() * w;
                let n = facet.kind.shape_functions(r, s);
                for (a, &node) in facet.nodes.iter().enumerate() {
                    if let Ok(k) = self.nodes.binary_search(&node) {
                        areas[k] += n[a] * da;
                    }
                }
            }
        }
        self.areas = areas;
        Ok(())
    }

    /// Position and tangents (x_r, x_s) of facet `f` at (r, s).
    pub fn geometry(&self, f: usize, r: f64, s: f64, x: &[Point3]) -> (Point3, Vec3, Vec3) {
        let facet = &self.facets[f];
        let n = facet.kind.shape_functions(r, s);
        let (dr, ds) = facet.kind.shape_derivatives(r, s);
        facet.nodes.iter().enumerate().fold(
            (Point3::zeros(), Vec3::zeros(), Vec3::zeros()),
            |(p, xr, xs), (a, &node)| (p + x[node] * n[a], xr + x[node] * dr[a], xs + x[node] * ds[a]),
        )
    }

    /// Point of facet `f` at (r, s).
    pub fn point(&self, f: usize, r: f64, s: f64, x: &[Point3]) -> Point3 {
        self.geometry(f, r, s, x).0
    }

    /// Natural coordinates of the point of facet `f` closest to `p`.
    ///
    /// Gauss-Newton on |x(r, s) - p|², started at the centroid. The result
    /// may lie outside the facet.
    pub fn project_onto_facet(&self, f: usize, p: &Point3, x: &[Point3]) -> (f64, f64) {
        let (mut r, mut s) = self.facets[f].kind.centroid();
        for _ in 0..MAX_PROJECTION_ITERATIONS {
            let (q, xr, xs) = self.geometry(f, r, s, x);
            let d = p - q;
            let a = Matrix2::new(xr.dot(&xr), xr.dot(&xs), xs.dot(&xr), xs.dot(&xs));
            let b = Vector2::new(xr.dot(&d), xs.dot(&d));
            let Some(delta) = a.try_inverse().map(|ai| ai * b) else {
                break;
            };
            if !delta.iter().all(|v| v.is_finite()) {
                break;
            }
            r += delta[0];
            s += delta[1];
            if delta.norm() < PROJECTION_TOLERANCE {
                break;
            }
        }
        (r, s)
    }

    /// Closest facet point to `p` within the search limits.
    ///
    /// Facets containing `exclude` are skipped, which keeps a node of a
    /// self-contacting surface from finding its own facets.
    pub fn closest(
        &self,
        p: &Point3,
        x: &[Point3],
        search_tolerance: f64,
        search_radius: Option<f64>,
        exclude: Option<usize>,
    ) -> Option<Projection> {
        let mut best: Option<(f64, Projection)> = None;
        for (f, facet) in self.facets.iter().enumerate() {
            if exclude.is_some_and(|n| facet.nodes.contains(&n)) {
                continue;
            }
            if search_radius.is_some_and(|rad| !self.within_reach(f, p, x, rad)) {
                continue;
            }
            let (r, s) = self.project_onto_facet(f, p, x);
            if !facet.kind.contains(r, s, search_tolerance) {
                continue;
            }
            let (r, s) = facet.kind.clamp(r, s);
            let (q, xr, xs) = self.geometry(f, r, s, x);
            let distance = (p - q).norm();
            if search_radius.is_some_and(|rad| distance > rad) {
                continue;
            }
            let normal = xr.cross(&xs);
            if normal.norm() == 0.0 {
                continue;
            }
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((
                    distance,
                    Projection {
                        facet: f,
                        r,
                        s,
                        point: q,
                        normal: normal.normalize(),
                        tangents: [xr, xs],
                        twist: self.twist(f, x),
                    },
                ));
            }
        }
        best.map(|(_, proj)| proj)
    }

    /// Whether the bounding box of facet `f`, grown by `radius`, contains
    /// `p`. A facet lies inside the box of its nodes, so facets failing
    /// this test have no point within `radius`.
    pub(crate) fn within_reach(&self, f: usize, p: &Point3, x: &[Point3], radius: f64) -> bool {
        let mut nodes = self.facets[f].nodes.iter().map(|&n| x[n]);
        let Some(first) = nodes.next() else {
            return false;
        };
        let (lo, hi) = nodes.fold((first, first), |(lo, hi), q| (lo.inf(&q), hi.sup(&q)));
        (0..3).all(|k| p[k] >= lo[k] - radius && p[k] <= hi[k] + radius)
    }

    /// Mixed derivative x_rs of facet `f`.
    pub fn twist(&self, f: usize, x: &[Point3]) -> Vec3 {
        let facet = &self.facets[f];
        facet
            .nodes
            .iter()
            .zip(facet.kind.mixed_derivatives())
            .fold(Vec3::zeros(), |t, (&node, d)| t + x[node] * d)
    }

    /// Shape function values of the projection's facet at its (r, s).
    pub fn shape_functions(&self, proj: &Projection) -> [f64; 4] {
        self.facets[proj.facet].kind.shape_functions(proj.r, proj.s)
    }

    /// Shape function derivatives of the projection's facet at its (r, s).
    pub fn shape_derivatives(&self, proj: &Projection) -> ([f64; 4], [f64; 4]) {
        self.facets[proj.facet].kind.shape_derivatives(proj.r, proj.s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 2 × 1 quads on z = 0, normal +z.
    fn strip() -> (Surface, Vec<Point3>) {
        let x = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        let mut surface = Surface::from_quads("strip", &[[0, 1, 4, 3], [1, 2, 5, 4]]).unwrap();
        surface.initialize(&x).unwrap();
        (surface, x)
    }

    #[test]
    fn test_nodal_areas_sum_to_surface_area() {
        let (surface, _) = strip();
        assert_eq!(surface.nodes(), &[0, 1, 2, 3, 4, 5]);
        assert_relative_eq!(surface.area(), 2.0, epsilon = 1e-14);
        // shared edge nodes collect from both facets
        assert_relative_eq!(surface.node_areas()[1], 0.5, epsilon = 1e-14);
        assert_relative_eq!(surface.node_areas()[0], 0.25, epsilon = 1e-14);
    }

    #[test]
    fn test_projection_finds_closest_facet() {
        let (surface, x) = strip();
        let p = Point3::new(1.5, 0.25, -0.1);
        let proj = surface.closest(&p, &x, 0.01, None, None).unwrap();
        assert_eq!(proj.facet, 1);
        assert_relative_eq!(proj.point, Point3::new(1.5, 0.25, 0.0), epsilon = 1e-12);
        assert_relative_eq!(proj.normal, Vec3::z(), epsilon = 1e-12);
        let n = surface.shape_functions(&proj);
        assert_relative_eq!(n.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_projection_on_warped_facet() {
        let mut x = strip().1;
        x[4].z = 0.3;
        let surface = Surface::from_quads("warped", &[[0, 1, 4, 3]]).unwrap();
        let p = Point3::new(0.6, 0.7, 0.5);
        let (r, s) = surface.project_onto_facet(0, &p, &x);
        let (q, xr, xs) = surface.geometry(0, r, s, &x);
        // the residual is orthogonal to both tangents at the closest point
        assert_relative_eq!((p - q).dot(&xr), 0.0, epsilon = 1e-9);
        assert_relative_eq!((p - q).dot(&xs), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_search_limits() {
        let (surface, x) = strip();
        let outside = Point3::new(2.5, 0.5, 0.0);
        assert!(surface.closest(&outside, &x, 0.01, None, None).is_none());
        let far = Point3::new(0.5, 0.5, 2.0);
        assert!(surface.closest(&far, &x, 0.01, Some(1.0), None).is_none());
        assert!(surface.closest(&far, &x, 0.01, None, None).is_some());
        // excluding node 1 removes both facets
        let near = Point3::new(1.0, 0.5, 0.0);
        assert!(surface.closest(&near, &x, 0.01, None, Some(1)).is_none());
    }

    #[test]
    fn test_bounding_box_filter() {
        let (surface, x) = strip();
        let p = Point3::new(2.3, 0.5, 0.1);
        assert!(surface.within_reach(1, &p, &x, 0.5));
        assert!(!surface.within_reach(0, &p, &x, 0.5));
        assert!(!surface.within_reach(1, &Point3::new(1.5, 0.5, 0.8), &x, 0.5));
        // the filter never drops the facet holding the closest point
        let q = Point3::new(1.7, 0.4, 0.3);
        let proj = surface.closest(&q, &x, 0.01, Some(0.5), None).unwrap();
        assert_eq!(proj.facet, 1);
        assert_relative_eq!(proj.point, Point3::new(1.7, 0.4, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_surfaces() {
        assert!(Surface::new("empty", Vec::new()).is_err());
        let bad = Facet {
            kind: FacetKind::Tri3,
            nodes: vec![0, 1],
        };
        assert!(Surface::new("bad", vec![bad]).is_err());
        let (mut surface, _) = strip();
        assert!(surface.initialize(&[Point3::zeros(); 3]).is_err());
    }
}
