//! Contact and constraint interfaces.
//!
//! An interface projects the nodes of one surface onto the facets of
//! another, adds penalty plus multiplier tractions to the global system and
//! updates its multipliers in augmentation passes between Newton solves.
//! Every pairing of a node with a facet writes to the equations of
//! `[node, facet nodes...]`; those lists are the interface's footprint in the
//! sparsity profile.

pub mod periodic;
pub mod sliding;
pub mod surface;

pub use periodic::PeriodicInterface;
pub use sliding::SlidingInterface;
pub use surface::{Facet, Projection, Surface};

use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::config::ContactConfig;
use crate::dof::EquationMap;
use crate::error::Result;
use crate::sparse::{GlobalMatrix, GlobalVector};
use crate::types::{Mat3, Point3, Vec3};

/// Result of one augmentation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AugmentationStatus {
    /// Multipliers and gaps are within tolerance.
    Converged,
    /// Multipliers were updated; Newton must run again.
    NeedsAugmentation,
    /// The pass budget is spent without convergence.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugmentationReport {
    pub status: AugmentationStatus,
    /// Multiplier norm after the pass.
    pub multiplier_norm: f64,
    /// Largest constraint violation before the pass.
    pub max_gap: f64,
}

/// A contact or constraint interface contributing to the global system.
pub trait ContactInterface: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn config(&self) -> &ContactConfig;

    /// Validate node indices, integrate reference areas and set up the
    /// contact points. Multipliers start at zero.
    fn initialize(&mut self, reference: &[Point3]) -> Result<()>;

    /// Re-project and evaluate gaps on the current configuration.
    fn update(&mut self, current: &[Point3]) -> Result<()>;

    /// Equation lists of every projected pair.
    fn equation_lists(&self, map: &dyn EquationMap) -> Vec<Vec<isize>>;

    /// Add contact forces to `r`.
    fn residual(&self, map: &dyn EquationMap, r: &mut GlobalVector);

    /// Add the contact stiffness to `k`.
    fn stiffness(&self, map: &dyn EquationMap, k: &mut GlobalMatrix) -> Result<()>;

    /// Run augmentation pass `pass` (counting from 0).
    fn augment(&mut self, pass: usize) -> AugmentationReport;

    /// Flattened multipliers, in contact point order.
    fn multipliers(&self) -> Vec<f64>;

    fn set_multipliers(&mut self, values: &[f64]) -> Result<()>;

    /// Resultant force on the slave side.
    fn contact_force(&self) -> Vec3;
}

/// Decide the outcome of augmentation pass `pass` from the multiplier norms
/// before (`norm0`) and after (`norm1`) the update.
pub(crate) fn augmentation_status(
    config: &ContactConfig,
    pass: usize,
    norm0: f64,
    norm1: f64,
    max_gap: f64,
) -> AugmentationStatus {
    if !config.augmented_lagrangian {
        return AugmentationStatus::Converged;
    }
    let multipliers_settled =
        norm1 == 0.0 || ((norm1 - norm0) / norm1).abs() < config.augmentation_tolerance;
    let gap_settled = config.gap_tolerance == 0.0 || max_gap < config.gap_tolerance;
    if pass >= config.min_augmentations && multipliers_settled && gap_settled {
        AugmentationStatus::Converged
    } else if pass >= config.max_augmentations {
        AugmentationStatus::Exhausted
    } else {
        AugmentationStatus::NeedsAugmentation
    }
}

/// Weights of a node-to-facet pair: 1 for the slave node, -N_a for the
/// facet nodes.
pub(crate) fn pair_weights(n: &[f64; 4], facet_nodes: usize) -> Vec<f64> {
    std::iter::once(1.0)
        .chain(n[..facet_nodes].iter().map(|v| -v))
        .collect()
}

/// Pair matrix `scale (w ⊗ w) ⊗ block`.
pub(crate) fn pair_matrix(weights: &[f64], block: &Mat3, scale: f64) -> DMatrix<f64> {
    let m = weights.len();
    let mut ke = DMatrix::zeros(3 * m, 3 * m);
    for (i, wi) in weights.iter().enumerate() {
        for (j, wj) in weights.iter().enumerate() {
            let c = scale * wi * wj;
            for k in 0..3 {
                for l in 0..3 {
                    ke[(3 * i + k, 3 * j + l)] = c * block[(k, l)];
                }
            }
        }
    }
    ke
}

/// Pair vector `w ⊗ v`.
pub(crate) fn pair_vector(weights: &[f64], v: &Vec3) -> Vec<f64> {
    weights
        .iter()
        .flat_map(|w| [w * v.x, w * v.y, w * v.z])
        .collect()
}

pub(crate) fn pair_nodes(node: usize, facet_nodes: &[usize]) -> Vec<usize> {
    std::iter::once(node).chain(facet_nodes.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_pass_is_never_converged() {
        let config = ContactConfig::default();
        assert_eq!(
            augmentation_status(&config, 0, 0.0, 2.0, 0.1),
            AugmentationStatus::NeedsAugmentation
        );
        assert_eq!(
            augmentation_status(&config, 3, 2.0, 2.001, 0.1),
            AugmentationStatus::Converged
        );
    }

    #[test]
    fn test_pass_budget() {
        let config = ContactConfig {
            min_augmentations: 2,
            max_augmentations: 4,
            ..Default::default()
        };
        // settled but below the minimum
        assert_eq!(
            augmentation_status(&config, 1, 1.0, 1.0, 0.0),
            AugmentationStatus::NeedsAugmentation
        );
        assert_eq!(
            augmentation_status(&config, 4, 1.0, 2.0, 0.0),
            AugmentationStatus::Exhausted
        );
    }

    #[test]
    fn test_gap_tolerance_and_penalty_only() {
        let config = ContactConfig {
            gap_tolerance: 1e-3,
            ..Default::default()
        };
        assert_eq!(
            augmentation_status(&config, 2, 1.0, 1.0, 0.01),
            AugmentationStatus::NeedsAugmentation
        );
        let penalty = ContactConfig::penalty_only(10.0);
        assert_eq!(
            augmentation_status(&penalty, 0, 0.0, 5.0, 1.0),
            AugmentationStatus::Converged
        );
    }

    #[test]
    fn test_pair_helpers() {
        let w = pair_weights(&[0.25, 0.25, 0.25, 0.25], 4);
        assert_eq!(w, vec![1.0, -0.25, -0.25, -0.25, -0.25]);
        assert_relative_eq!(w.iter().sum::<f64>(), 0.0);
        let f = pair_vector(&w, &Vec3::z());
        assert_eq!(f.len(), 15);
        assert_eq!(f[2], 1.0);
        let ke = pair_matrix(&w, &(Vec3::z() * Vec3::z().transpose()), 2.0);
        assert_relative_eq!(ke, ke.transpose());
        assert_relative_eq!(ke[(2, 2)], 2.0);
        assert_relative_eq!(ke[(2, 5)], -0.5);
        assert_eq!(pair_nodes(7, &[1, 2, 3]), vec![7, 1, 2, 3]);
    }
}
