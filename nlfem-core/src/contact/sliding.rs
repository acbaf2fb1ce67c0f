//! Frictionless sliding contact with nodal integration.
//!
//! Each slave node s with tributary area A is paired with the closest
//! master point ρ with outward normal ν. The gap g = ν·(x_s - ρ) is
//! negative on penetration and the normal traction is
//! t_n = max(0, λ - ε g). The slave node receives t_n A ν and each master
//! node a receives -N_a t_n A ν.
//!
//! The tangent is the full derivative of these forces. Besides the penalty
//! term ε A (w ν)(w ν)ᵀ it carries t_n A times the rotation of ν and the
//! sliding of ρ across the facet. With x_s - ρ = g ν the projection moves by
//! (m - g h) dξ = x_α·(dx_s - N_b dx_b) + g ν·N_b,α dx_b, where m is the
//! metric and h the curvature of the facet, and the normal turns by
//! dν = -m^αβ (ν·dx_,α) x_,β.

use nalgebra::{DMatrix, DVector, Matrix2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ContactConfig;
use crate::contact::surface::{Projection, Surface};
use crate::contact::{
    augmentation_status, pair_matrix, pair_nodes, pair_vector, pair_weights, AugmentationReport,
    AugmentationStatus, ContactInterface,
};
use crate::dof::EquationMap;
use crate::error::{Error, Result};
use crate::sparse::{GlobalMatrix, GlobalVector};
use crate::types::{Point3, Vec3};

/// State of one slave node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub node: usize,
    pub area: f64,
    pub multiplier: f64,
    /// Signed normal gap, negative on penetration.
    pub gap: f64,
    pub projection: Option<Projection>,
}

impl ContactPoint {
    fn new(node: usize, area: f64) -> Self {
        Self {
            node,
            area,
            multiplier: 0.0,
            gap: 0.0,
            projection: None,
        }
    }

    /// Normal traction, zero when separated or unpaired.
    pub fn traction(&self, penalty: f64) -> f64 {
        match self.projection {
            Some(_) => (self.multiplier - penalty * self.gap).max(0.0),
            None => 0.0,
        }
    }

    /// Penetration depth, zero when separated or unpaired.
    pub fn penetration(&self) -> f64 {
        match self.projection {
            Some(_) => (-self.gap).max(0.0),
            None => 0.0,
        }
    }
}

/// Which surface the nodes of a pass come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Slave,
    Master,
}

#[derive(Debug, Clone)]
struct Pass {
    nodes_from: Side,
    points: Vec<ContactPoint>,
}

#[derive(Debug, Clone)]
pub struct SlidingInterface {
    name: String,
    config: ContactConfig,
    slave: Surface,
    master: Surface,
    self_contact: bool,
    passes: Vec<Pass>,
}

impl SlidingInterface {
    /// Contact between two surfaces. With `two_pass` set the master nodes
    /// are also projected onto the slave surface.
    pub fn new(
        name: impl Into<String>,
        slave: Surface,
        master: Surface,
        config: ContactConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            slave,
            master,
            self_contact: false,
            passes: Vec::new(),
        })
    }

    /// A surface contacting itself. Nodes never pair with their own facets.
    pub fn self_contact(name: impl Into<String>, surface: Surface, config: ContactConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            master: surface.clone(),
            slave: surface,
            self_contact: true,
            passes: Vec::new(),
        })
    }

    pub fn is_self_contact(&self) -> bool {
        self.self_contact
    }

    pub fn slave(&self) -> &Surface {
        &self.slave
    }

    pub fn master(&self) -> &Surface {
        &self.master
    }

    /// Contact points of all passes.
    pub fn points(&self) -> impl Iterator<Item = &ContactPoint> {
        self.passes.iter().flat_map(|p| p.points.iter())
    }

    /// Number of points carrying a positive traction.
    pub fn active_points(&self) -> usize {
        self.points().filter(|p| p.traction(self.config.penalty) > 0.0).count()
    }

    /// Largest penetration over all points.
    pub fn max_penetration(&self) -> f64 {
        self.points().map(ContactPoint::penetration).fold(0.0, f64::max)
    }

    /// Surface whose facets the nodes of `side` are projected onto.
    fn target(&self, side: Side) -> &Surface {
        match side {
            Side::Slave => &self.master,
            Side::Master => &self.slave,
        }
    }

    fn build_pass(surface: &Surface, nodes_from: Side) -> Pass {
        Pass {
            nodes_from,
            points: surface
                .nodes()
                .iter()
                .zip(surface.node_areas())
                .map(|(&node, &area)| ContactPoint::new(node, area))
                .collect(),
        }
    }

    /// Pair weights and node list of a projected point.
    fn pair(&self, side: Side, point: &ContactPoint, proj: &Projection) -> (Vec<f64>, Vec<usize>) {
        let target = self.target(side);
        let facet = &target.facets()[proj.facet];
        let n = target.shape_functions(proj);
        (
            pair_weights(&n, facet.nodes.len()),
            pair_nodes(point.node, &facet.nodes),
        )
    }

    /// Tangent of an active pair carrying traction `tn`.
    fn pair_stiffness(
        &self,
        side: Side,
        point: &ContactPoint,
        proj: &Projection,
        tn: f64,
    ) -> (DMatrix<f64>, Vec<usize>) {
        let (w, nodes) = self.pair(side, point, proj);
        let nu = proj.normal;
        let mut ke = pair_matrix(&w, &(nu * nu.transpose()), self.config.penalty * point.area);

        let m = w.len();
        let (dr, ds) = self.target(side).shape_derivatives(proj);
        let dn = [dr, ds];
        let t = proj.tangents;
        let g = point.gap;
        let metric = Matrix2::new(t[0].dot(&t[0]), t[0].dot(&t[1]), t[1].dot(&t[0]), t[1].dot(&t[1]));
        let h = nu.dot(&proj.twist);
        let curvature = Matrix2::new(0.0, h, h, 0.0);
        let (Some(metric_inv), Some(slide_inv)) =
            (metric.try_inverse(), (metric - curvature * g).try_inverse())
        else {
            return (ke, nodes);
        };

        // ν·N_b,α dx_b over the pair dofs
        let normal_rows: [DVector<f64>; 2] = std::array::from_fn(|a| {
            pair_row(m, |i| if i == 0 { Vec3::zeros() } else { nu * dn[a][i - 1] })
        });
        let rhs: [DVector<f64>; 2] = std::array::from_fn(|a| {
            pair_row(m, |i| t[a] * w[i]) + &normal_rows[a] * g
        });
        let dxi: [DVector<f64>; 2] =
            std::array::from_fn(|b| &rhs[0] * slide_inv[(b, 0)] + &rhs[1] * slide_inv[(b, 1)]);
        // ν·dx_,α
        let turn: [DVector<f64>; 2] = std::array::from_fn(|a| {
            &normal_rows[a] + &dxi[0] * curvature[(a, 0)] + &dxi[1] * curvature[(a, 1)]
        });
        let mut dnu = DMatrix::<f64>::zeros(3, 3 * m);
        for a in 0..2 {
            for b in 0..2 {
                let c = -metric_inv[(a, b)];
                for k in 0..3 {
                    for j in 0..3 * m {
                        dnu[(k, j)] += c * t[b][k] * turn[a][j];
                    }
                }
            }
        }

        let scale = tn * point.area;
        for i in 0..m {
            let dna = (i > 0).then(|| &dxi[0] * dn[0][i - 1] + &dxi[1] * dn[1][i - 1]);
            for k in 0..3 {
                for j in 0..3 * m {
                    let slide = dna.as_ref().map_or(0.0, |d| nu[k] * d[j]);
                    ke[(3 * i + k, j)] += scale * (slide - w[i] * dnu[(k, j)]);
                }
            }
        }
        (ke, nodes)
    }
}

/// Row over the dofs of an `m`-node pair built from per-node blocks.
fn pair_row(m: usize, block: impl Fn(usize) -> Vec3) -> DVector<f64> {
    DVector::from_iterator(
        3 * m,
        (0..m).flat_map(|i| {
            let v = block(i);
            [v.x, v.y, v.z]
        }),
    )
}

impl ContactInterface for SlidingInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ContactConfig {
        &self.config
    }

    fn initialize(&mut self, reference: &[Point3]) -> Result<()> {
        self.slave.initialize(reference)?;
        self.master.initialize(reference)?;
        self.passes = vec![Self::build_pass(&self.slave, Side::Slave)];
        if self.config.two_pass && !self.self_contact {
            self.passes.push(Self::build_pass(&self.master, Side::Master));
        }
        debug!(
            interface = %self.name,
            points = self.points().count(),
            passes = self.passes.len(),
            "initialized sliding interface"
        );
        Ok(())
    }

    fn update(&mut self, current: &[Point3]) -> Result<()> {
        let config = &self.config;
        let (slave, master) = (&self.slave, &self.master);
        for pass in &mut self.passes {
            let target = match pass.nodes_from {
                Side::Slave => master,
                Side::Master => slave,
            };
            pass.points.par_iter_mut().for_each(|point| {
                let x = current[point.node];
                point.projection = target.closest(
                    &x,
                    current,
                    config.search_tolerance,
                    config.search_radius,
                    Some(point.node),
                );
                match &point.projection {
                    Some(proj) => point.gap = proj.normal.dot(&(x - proj.point)),
                    None => {
                        point.gap = 0.0;
                        point.multiplier = 0.0;
                    }
                }
            });
        }
        Ok(())
    }

    fn equation_lists(&self, map: &dyn EquationMap) -> Vec<Vec<isize>> {
        self.passes
            .iter()
            .flat_map(|pass| pass.points.iter().map(move |pt| (pass.nodes_from, pt)))
            .filter_map(|(side, pt)| {
                let proj = pt.projection.as_ref()?;
                Some(map.element_lm(&self.pair(side, pt, proj).1))
            })
            .collect()
    }

    fn residual(&self, map: &dyn EquationMap, r: &mut GlobalVector) {
        for pass in &self.passes {
            for pt in &pass.points {
                let tn = pt.traction(self.config.penalty);
                let Some(proj) = pt.projection.as_ref().filter(|_| tn > 0.0) else {
                    continue;
                };
                let (w, nodes) = self.pair(pass.nodes_from, pt, proj);
                let fe = pair_vector(&w, &(proj.normal * (tn * pt.area)));
                r.assemble(&map.element_lm(&nodes), &fe);
            }
        }
    }

    fn stiffness(&self, map: &dyn EquationMap, k: &mut GlobalMatrix) -> Result<()> {
        for pass in &self.passes {
            for pt in &pass.points {
                let tn = pt.traction(self.config.penalty);
                let Some(proj) = pt.projection.as_ref().filter(|_| tn > 0.0) else {
                    continue;
                };
                let (ke, nodes) = self.pair_stiffness(pass.nodes_from, pt, proj, tn);
                k.assemble(&map.element_lm(&nodes), &ke)?;
            }
        }
        Ok(())
    }

    fn augment(&mut self, pass: usize) -> AugmentationReport {
        let eps = self.config.penalty;
        let norm0 = self.points().map(|p| p.multiplier * p.multiplier).sum::<f64>().sqrt();
        let updated: Vec<f64> = self.points().map(|p| p.traction(eps)).collect();
        let norm1 = updated.iter().map(|l| l * l).sum::<f64>().sqrt();
        let max_gap = self.max_penetration();

        let status = augmentation_status(&self.config, pass, norm0, norm1, max_gap);
        if status == AugmentationStatus::NeedsAugmentation {
            let points = self.passes.iter_mut().flat_map(|p| p.points.iter_mut());
            for (pt, lambda) in points.zip(updated) {
                pt.multiplier = lambda;
            }
        }
        debug!(
            interface = %self.name,
            pass,
            multiplier_norm = norm1,
            max_gap,
            ?status,
            "augmentation"
        );
        AugmentationReport {
            status,
            multiplier_norm: norm1,
            max_gap,
        }
    }

    fn multipliers(&self) -> Vec<f64> {
        self.points().map(|p| p.multiplier).collect()
    }

    fn set_multipliers(&mut self, values: &[f64]) -> Result<()> {
        let n = self.points().count();
        if values.len() != n {
            return Err(Error::Checkpoint(format!(
                "interface '{}' has {n} multipliers, got {}",
                self.name,
                values.len()
            )));
        }
        let points = self.passes.iter_mut().flat_map(|p| p.points.iter_mut());
        for (pt, &lambda) in points.zip(values) {
            pt.multiplier = lambda;
        }
        Ok(())
    }

    fn contact_force(&self) -> Vec3 {
        self.passes
            .iter()
            .filter(|p| p.nodes_from == Side::Slave)
            .flat_map(|p| p.points.iter())
            .filter_map(|pt| {
                let proj = pt.projection.as_ref()?;
                Some(proj.normal * (pt.traction(self.config.penalty) * pt.area))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::NodalDofs;
    use crate::profile::SparseMatrixProfile;
    use approx::assert_relative_eq;

    const GAP: f64 = 0.01;

    /// Unit master square on z = 0 facing +z and a slave square facing -z
    /// that has sunk `GAP` into it.
    fn overlapping_squares() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, -GAP),
            Point3::new(0.0, 1.0, -GAP),
            Point3::new(1.0, 1.0, -GAP),
            Point3::new(1.0, 0.0, -GAP),
        ]
    }

    fn interface(config: ContactConfig) -> (SlidingInterface, Vec<Point3>) {
        let x = overlapping_squares();
        let master = Surface::from_quads("master", &[[0, 1, 2, 3]]).unwrap();
        let slave = Surface::from_quads("slave", &[[4, 5, 6, 7]]).unwrap();
        let mut contact = SlidingInterface::new("pair", slave, master, config).unwrap();
        contact.initialize(&x).unwrap();
        contact.update(&x).unwrap();
        (contact, x)
    }

    fn residual(contact: &SlidingInterface, map: &NodalDofs) -> GlobalVector {
        let mut r = GlobalVector::zeros(map.len());
        contact.residual(map, &mut r);
        r
    }

    fn stiffness(contact: &SlidingInterface, map: &NodalDofs) -> GlobalMatrix {
        let mut profile = SparseMatrixProfile::new(map.len()).unwrap();
        profile.update_profile(&contact.equation_lists(map)).unwrap();
        let mut k = GlobalMatrix::from_profile(&profile).unwrap();
        contact.stiffness(map, &mut k).unwrap();
        k
    }

    /// Warped master square and a smaller, skewed slave quad sunk into its
    /// interior, so every projection lands away from facet edges.
    fn warped_interface() -> (SlidingInterface, Vec<Point3>) {
        let x = vec![
            Point3::new(0.0, 0.0, -0.02),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.1),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.2, 0.3, -0.05),
            Point3::new(0.3, 0.8, -0.05),
            Point3::new(0.8, 0.7, -0.04),
            Point3::new(0.7, 0.2, -0.06),
        ];
        let master = Surface::from_quads("master", &[[0, 1, 2, 3]]).unwrap();
        let slave = Surface::from_quads("slave", &[[4, 5, 6, 7]]).unwrap();
        let mut contact =
            SlidingInterface::new("pair", slave, master, ContactConfig::penalty_only(100.0)).unwrap();
        contact.initialize(&x).unwrap();
        contact.update(&x).unwrap();
        (contact, x)
    }

    #[test]
    fn test_penetration_pushes_surfaces_apart() {
        let (contact, _) = interface(ContactConfig::penalty_only(100.0));
        assert_eq!(contact.active_points(), 4);
        assert_relative_eq!(contact.max_penetration(), GAP, epsilon = 1e-12);
        assert_relative_eq!(contact.contact_force(), Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-10);

        let map = NodalDofs { n_nodes: 8 };
        let r = residual(&contact, &map);
        let fz = |nodes: std::ops::Range<usize>| nodes.map(|n| r.as_slice()[3 * n + 2]).sum::<f64>();
        assert_relative_eq!(fz(4..8), 1.0, epsilon = 1e-10);
        assert_relative_eq!(fz(0..4), -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_separated_surfaces_carry_no_force() {
        let (mut contact, mut x) = interface(ContactConfig::penalty_only(100.0));
        for p in &mut x[4..] {
            p.z = 0.05;
        }
        contact.update(&x).unwrap();
        assert_eq!(contact.active_points(), 0);
        assert_eq!(contact.contact_force(), Vec3::zeros());
    }

    #[test]
    fn test_stiffness_matches_residual_derivative() {
        let (mut contact, mut x) = interface(ContactConfig::penalty_only(100.0));
        let map = NodalDofs { n_nodes: 8 };
        let k = stiffness(&contact, &map);

        let h = 1e-7;
        let col = 3 * 4 + 2;
        x[4].z += h;
        contact.update(&x).unwrap();
        let rp = residual(&contact, &map);
        x[4].z -= 2.0 * h;
        contact.update(&x).unwrap();
        let rm = residual(&contact, &map);
        for row in 0..map.len() {
            let fd = -(rp.as_slice()[row] - rm.as_slice()[row]) / (2.0 * h);
            assert_relative_eq!(k.get(row, col), fd, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_stiffness_on_warped_master_covers_rotation_and_sliding() {
        let (mut contact, mut x) = warped_interface();
        assert_eq!(contact.active_points(), 4);
        for pt in contact.points() {
            let proj = pt.projection.as_ref().unwrap();
            assert!(proj.r.abs() < 0.9 && proj.s.abs() < 0.9);
        }
        let map = NodalDofs { n_nodes: 8 };
        let k = stiffness(&contact, &map);

        let h = 1e-6;
        for col in 0..map.len() {
            let (node, dir) = (col / 3, col % 3);
            x[node][dir] += h;
            contact.update(&x).unwrap();
            let rp = residual(&contact, &map);
            x[node][dir] -= 2.0 * h;
            contact.update(&x).unwrap();
            let rm = residual(&contact, &map);
            x[node][dir] += h;
            for row in 0..map.len() {
                let fd = -(rp.as_slice()[row] - rm.as_slice()[row]) / (2.0 * h);
                assert_relative_eq!(k.get(row, col), fd, epsilon = 1e-5);
            }
        }
        // frictionless contact forces derive from a potential
        for row in 0..map.len() {
            for col in 0..row {
                assert_relative_eq!(k.get(row, col), k.get(col, row), epsilon = 1e-9);
            }
        }
        // moving the master corner tilts ν and loads the slave tangentially
        assert!(k.get(3 * 4, 2).abs() > 1e-3);
    }

    #[test]
    fn test_augmentation_accumulates_multipliers() {
        let config = ContactConfig {
            penalty: 100.0,
            max_augmentations: 3,
            ..Default::default()
        };
        let (mut contact, _) = interface(config);
        let first = contact.augment(0);
        assert_eq!(first.status, AugmentationStatus::NeedsAugmentation);
        assert_relative_eq!(first.max_gap, GAP, epsilon = 1e-12);
        for pt in contact.points() {
            assert_relative_eq!(pt.multiplier, 100.0 * GAP, epsilon = 1e-10);
        }
        // same configuration: the traction doubles with the multiplier
        assert_relative_eq!(contact.contact_force().z, 2.0, epsilon = 1e-10);

        // frozen geometry keeps growing λ until the budget runs out
        assert_eq!(contact.augment(1).status, AugmentationStatus::NeedsAugmentation);
        assert_eq!(contact.augment(2).status, AugmentationStatus::NeedsAugmentation);
        assert_eq!(contact.augment(3).status, AugmentationStatus::Exhausted);
    }

    #[test]
    fn test_two_pass_and_multiplier_restore() {
        let config = ContactConfig {
            two_pass: true,
            ..ContactConfig::with_penalty(10.0)
        };
        let (mut contact, _) = interface(config);
        assert_eq!(contact.points().count(), 8);
        // both sides are pushed apart
        assert_eq!(contact.active_points(), 8);
        contact.augment(0);
        let saved = contact.multipliers();
        contact.set_multipliers(&vec![0.0; 8]).unwrap();
        assert!(contact.multipliers().iter().all(|&l| l == 0.0));
        contact.set_multipliers(&saved).unwrap();
        assert_eq!(contact.multipliers(), saved);
        assert!(contact.set_multipliers(&[1.0]).is_err());
    }

    #[test]
    fn test_self_contact_skips_own_facets() {
        let x = overlapping_squares();
        let folded = Surface::from_quads("folded", &[[0, 1, 2, 3], [4, 5, 6, 7]]).unwrap();
        let mut contact =
            SlidingInterface::self_contact("fold", folded, ContactConfig::penalty_only(10.0)).unwrap();
        contact.initialize(&x).unwrap();
        contact.update(&x).unwrap();
        assert!(contact.is_self_contact());
        for pt in contact.points() {
            let proj = pt.projection.as_ref().unwrap();
            let facet = &contact.master().facets()[proj.facet];
            assert!(!facet.nodes.contains(&pt.node));
            assert_relative_eq!(pt.gap, -GAP, epsilon = 1e-12);
        }
        // the resultant on the whole surface cancels
        let map = NodalDofs { n_nodes: 8 };
        let r = residual(&contact, &map);
        assert_relative_eq!(r.as_slice().iter().skip(2).step_by(3).sum::<f64>(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_search_radius_limits_pairing() {
        let config = ContactConfig {
            search_radius: Some(GAP / 2.0),
            ..ContactConfig::penalty_only(10.0)
        };
        let (contact, _) = interface(config);
        assert_eq!(contact.points().filter(|p| p.projection.is_some()).count(), 0);
        assert!(contact.equation_lists(&NodalDofs { n_nodes: 8 }).is_empty());
    }
}
