//! Periodic boundary interface.
//!
//! Pairs every slave node with the master point it maps to under a fixed
//! reference offset. The pairing is made once on the reference
//! configuration. The vector gap
//!
//! g = (x_s - ρ) - F̄ (X_s - R)
//!
//! measures the deviation from a macroscopic deformation gradient F̄, where
//! R and ρ are the reference and current master points. The traction is
//! t = λ + ε g; the slave node receives -t A and master node a receives
//! N_a t A.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ContactConfig;
use crate::contact::surface::Surface;
use crate::contact::{
    augmentation_status, pair_matrix, pair_nodes, pair_vector, pair_weights, AugmentationReport,
    AugmentationStatus, ContactInterface,
};
use crate::dof::EquationMap;
use crate::error::{Error, Result};
use crate::sparse::{GlobalMatrix, GlobalVector};
use crate::types::{Mat3, Point3, Vec3};

/// A node tied to a fixed point of the opposite surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicPoint {
    pub node: usize,
    pub area: f64,
    pub facet: usize,
    pub r: f64,
    pub s: f64,
    /// X_s - R.
    pub reference_offset: Vec3,
    pub multiplier: Vec3,
    pub gap: Vec3,
}

impl PeriodicPoint {
    pub fn traction(&self, penalty: f64) -> Vec3 {
        self.multiplier + self.gap * penalty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Slave,
    Master,
}

#[derive(Debug, Clone)]
struct Pass {
    nodes_from: Side,
    points: Vec<PeriodicPoint>,
}

#[derive(Debug, Clone)]
pub struct PeriodicInterface {
    name: String,
    config: ContactConfig,
    slave: Surface,
    master: Surface,
    /// X_slave - X_master of matching points.
    offset: Vec3,
    macro_gradient: Mat3,
    passes: Vec<Pass>,
}

impl PeriodicInterface {
    pub fn new(
        name: impl Into<String>,
        slave: Surface,
        master: Surface,
        offset: Vec3,
        config: ContactConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            slave,
            master,
            offset,
            macro_gradient: Mat3::identity(),
            passes: Vec::new(),
        })
    }

    pub fn with_macro_gradient(mut self, f: Mat3) -> Self {
        self.macro_gradient = f;
        self
    }

    pub fn set_macro_gradient(&mut self, f: Mat3) {
        self.macro_gradient = f;
    }

    pub fn macro_gradient(&self) -> &Mat3 {
        &self.macro_gradient
    }

    pub fn points(&self) -> impl Iterator<Item = &PeriodicPoint> {
        self.passes.iter().flat_map(|p| p.points.iter())
    }

    /// Largest gap magnitude.
    pub fn max_gap(&self) -> f64 {
        self.points().map(|p| p.gap.norm()).fold(0.0, f64::max)
    }

    fn target(&self, side: Side) -> &Surface {
        match side {
            Side::Slave => &self.master,
            Side::Master => &self.slave,
        }
    }

    /// Tie the nodes of `side` to the opposite surface.
    fn build_pass(&self, side: Side, reference: &[Point3]) -> Result<Pass> {
        let (source, shift) = match side {
            Side::Slave => (&self.slave, -self.offset),
            Side::Master => (&self.master, self.offset),
        };
        let target = self.target(side);
        let points = source
            .nodes()
            .iter()
            .zip(source.node_areas())
            .map(|(&node, &area)| {
                let x0 = reference[node];
                let proj = target
                    .closest(
                        &(x0 + shift),
                        reference,
                        self.config.search_tolerance,
                        self.config.search_radius,
                        None,
                    )
                    .ok_or_else(|| {
                        Error::Mesh(format!(
                            "node {node} of periodic interface '{}' has no partner on '{}'",
                            self.name,
                            target.name()
                        ))
                    })?;
                Ok(PeriodicPoint {
                    node,
                    area,
                    facet: proj.facet,
                    r: proj.r,
                    s: proj.s,
                    reference_offset: x0 - proj.point,
                    multiplier: Vec3::zeros(),
                    gap: Vec3::zeros(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Pass { nodes_from: side, points })
    }

    fn pair(&self, side: Side, pt: &PeriodicPoint) -> (Vec<f64>, Vec<usize>) {
        let facet = &self.target(side).facets()[pt.facet];
        let n = facet.kind.shape_functions(pt.r, pt.s);
        (
            pair_weights(&n, facet.nodes.len()),
            pair_nodes(pt.node, &facet.nodes),
        )
    }
}

impl ContactInterface for PeriodicInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ContactConfig {
        &self.config
    }

    fn initialize(&mut self, reference: &[Point3]) -> Result<()> {
        self.slave.initialize(reference)?;
        self.master.initialize(reference)?;
        let mut passes = vec![self.build_pass(Side::Slave, reference)?];
        if self.config.two_pass {
            passes.push(self.build_pass(Side::Master, reference)?);
        }
        self.passes = passes;
        debug!(
            interface = %self.name,
            points = self.points().count(),
            "initialized periodic interface"
        );
        Ok(())
    }

    fn update(&mut self, current: &[Point3]) -> Result<()> {
        let f = self.macro_gradient;
        let (slave, master) = (&self.slave, &self.master);
        for pass in &mut self.passes {
            let target = match pass.nodes_from {
                Side::Slave => master,
                Side::Master => slave,
            };
            pass.points.par_iter_mut().for_each(|pt| {
                let rho = target.point(pt.facet, pt.r, pt.s, current);
                pt.gap = (current[pt.node] - rho) - f * pt.reference_offset;
            });
        }
        Ok(())
    }

    fn equation_lists(&self, map: &dyn EquationMap) -> Vec<Vec<isize>> {
        self.passes
            .iter()
            .flat_map(|pass| {
                pass.points
                    .iter()
                    .map(move |pt| map.element_lm(&self.pair(pass.nodes_from, pt).1))
            })
            .collect()
    }

    fn residual(&self, map: &dyn EquationMap, r: &mut GlobalVector) {
        for pass in &self.passes {
            for pt in &pass.points {
                let (w, nodes) = self.pair(pass.nodes_from, pt);
                let t = pt.traction(self.config.penalty) * pt.area;
                let fe = pair_vector(&w, &(-t));
                r.assemble(&map.element_lm(&nodes), &fe);
            }
        }
    }

    fn stiffness(&self, map: &dyn EquationMap, k: &mut GlobalMatrix) -> Result<()> {
        for pass in &self.passes {
            for pt in &pass.points {
                let (w, nodes) = self.pair(pass.nodes_from, pt);
                let ke = pair_matrix(&w, &Mat3::identity(), self.config.penalty * pt.area);
                k.assemble(&map.element_lm(&nodes), &ke)?;
            }
        }
        Ok(())
    }

    fn augment(&mut self, pass: usize) -> AugmentationReport {
        let eps = self.config.penalty;
        let norm0 = self.points().map(|p| p.multiplier.norm_squared()).sum::<f64>().sqrt();
        let updated: Vec<Vec3> = self.points().map(|p| p.traction(eps)).collect();
        let norm1 = updated.iter().map(Vec3::norm_squared).sum::<f64>().sqrt();
        let max_gap = self.max_gap();

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
        self.points()
            .flat_map(|p| [p.multiplier.x, p.multiplier.y, p.multiplier.z])
            .collect()
    }

    fn set_multipliers(&mut self, values: &[f64]) -> Result<()> {
        let n = 3 * self.points().count();
        if values.len() != n {
            return Err(Error::Checkpoint(format!(
                "interface '{}' has {n} multipliers, got {}",
                self.name,
                values.len()
            )));
        }
        let points = self.passes.iter_mut().flat_map(|p| p.points.iter_mut());
        for (pt, lambda) in points.zip(values.chunks_exact(3)) {
            pt.multiplier = Vec3::from_column_slice(lambda);
        }
        Ok(())
    }

    fn contact_force(&self) -> Vec3 {
        self.passes
            .iter()
            .filter(|p| p.nodes_from == Side::Slave)
            .flat_map(|p| p.points.iter())
            .map(|pt| -pt.traction(self.config.penalty) * pt.area)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::NodalDofs;
    use crate::profile::SparseMatrixProfile;
    use approx::assert_relative_eq;

    /// Opposite faces x = 0 (master) and x = 1 (slave) of a unit cube.
    fn faces() -> (PeriodicInterface, Vec<Point3>) {
        let x = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let master = Surface::from_quads("left", &[[0, 3, 2, 1]]).unwrap();
        let slave = Surface::from_quads("right", &[[4, 7, 6, 5]]).unwrap();
        let mut periodic = PeriodicInterface::new(
            "x-periodic",
            slave,
            master,
            Vec3::x(),
            ContactConfig::with_penalty(50.0),
        )
        .unwrap();
        periodic.initialize(&x).unwrap();
        (periodic, x)
    }

    #[test]
    fn test_partners_found_in_reference() {
        let (periodic, x) = faces();
        assert_eq!(periodic.points().count(), 4);
        for pt in periodic.points() {
            assert_relative_eq!(pt.reference_offset, Vec3::x(), epsilon = 1e-12);
            assert_relative_eq!(pt.area, 0.25, epsilon = 1e-12);
            let partner = periodic.master.point(pt.facet, pt.r, pt.s, &x);
            assert_relative_eq!(x[pt.node] - partner, Vec3::x(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_macro_deformation_leaves_no_gap() {
        let (mut periodic, x) = faces();
        let f = Mat3::new(1.1, 0.2, 0.0, 0.0, 0.95, 0.0, 0.05, 0.0, 1.0);
        periodic.set_macro_gradient(f);
        let current: Vec<Point3> = x.iter().map(|p| f * p).collect();
        periodic.update(&current).unwrap();
        assert_relative_eq!(periodic.max_gap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(periodic.contact_force(), Vec3::zeros(), epsilon = 1e-10);
    }

    #[test]
    fn test_relative_slip_is_resisted() {
        let (mut periodic, mut x) = faces();
        for p in &mut x[4..] {
            p.y += 0.02;
        }
        periodic.update(&x).unwrap();
        assert_relative_eq!(periodic.max_gap(), 0.02, epsilon = 1e-12);
        // pulled back along -y, total 50 * 0.02 * 1
        assert_relative_eq!(periodic.contact_force(), Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-10);

        let map = NodalDofs { n_nodes: 8 };
        let mut r = GlobalVector::zeros(map.len());
        periodic.residual(&map, &mut r);
        assert_relative_eq!(r.as_slice().iter().sum::<f64>(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stiffness_matches_residual_derivative() {
        let (mut periodic, mut x) = faces();
        let map = NodalDofs { n_nodes: 8 };
        let mut profile = SparseMatrixProfile::new(map.len()).unwrap();
        profile.update_profile(&periodic.equation_lists(&map)).unwrap();
        let mut k = GlobalMatrix::from_profile(&profile).unwrap();
        periodic.stiffness(&map, &mut k).unwrap();

        let h = 1e-7;
        for col in [3 * 5 + 1, 3 * 2] {
            let (node, dof) = (col / 3, col % 3);
            let mut residual_at = |delta: f64| {
                x[node][dof] += delta;
                periodic.update(&x).unwrap();
                x[node][dof] -= delta;
                let mut r = GlobalVector::zeros(map.len());
                periodic.residual(&map, &mut r);
                r
            };
            let rp = residual_at(h);
            let rm = residual_at(-h);
            for row in 0..map.len() {
                let fd = -(rp.as_slice()[row] - rm.as_slice()[row]) / (2.0 * h);
                assert_relative_eq!(k.get(row, col), fd, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_augmentation_and_restore() {
        let (mut periodic, mut x) = faces();
        x[5].z += 0.01;
        periodic.update(&x).unwrap();
        let report = periodic.augment(0);
        assert_eq!(report.status, AugmentationStatus::NeedsAugmentation);
        assert_relative_eq!(report.max_gap, 0.01, epsilon = 1e-12);
        let saved = periodic.multipliers();
        assert_eq!(saved.len(), 12);
        assert_relative_eq!(saved.iter().map(|v| v.abs()).sum::<f64>(), 0.5, epsilon = 1e-10);

        periodic.set_multipliers(&vec![0.0; 12]).unwrap();
        periodic.set_multipliers(&saved).unwrap();
        assert_eq!(periodic.multipliers(), saved);
        assert!(periodic.set_multipliers(&saved[..3]).is_err());
    }

    #[test]
    fn test_missing_partner_is_a_mesh_error() {
        let x = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 5.0, 0.0),
            Point3::new(1.0, 5.0, 1.0),
            Point3::new(1.0, 6.0, 1.0),
            Point3::new(1.0, 6.0, 0.0),
        ];
        let master = Surface::from_quads("left", &[[0, 3, 2, 1]]).unwrap();
        let slave = Surface::from_quads("right", &[[4, 7, 6, 5]]).unwrap();
        let mut periodic =
            PeriodicInterface::new("shifted", slave, master, Vec3::x(), ContactConfig::default()).unwrap();
        assert!(matches!(periodic.initialize(&x), Err(Error::Mesh(_))));
    }
}
