//! Integration-point state.
//!
//! Every integration point owns one [`MaterialPoint`]: the trial deformation
//! written by the domain on every Newton update, and the history that only
//! the post-convergence commit may advance.

use serde::{Deserialize, Serialize};

use crate::types::Mat3;

/// Deformation state of an integration point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticState {
    /// Deformation gradient F.
    pub f: Mat3,
    /// Jacobian J = det F.
    pub j: f64,
    /// Local material axes (columns), identity unless set per element.
    pub q: Mat3,
    /// Time of the current (trial) state.
    pub time: f64,
    /// Cauchy stress of the last evaluation, kept for output.
    pub stress: Mat3,
}

impl Default for ElasticState {
    fn default() -> Self {
        Self {
            f: Mat3::identity(),
            j: 1.0,
            q: Mat3::identity(),
            time: 0.0,
            stress: Mat3::zeros(),
        }
    }
}

impl ElasticState {
    /// Right Cauchy-Green tensor C = FᵀF.
    pub fn right_cauchy_green(&self) -> Mat3 {
        self.f.transpose() * self.f
    }

    /// Left Cauchy-Green tensor b = FFᵀ.
    pub fn left_cauchy_green(&self) -> Mat3 {
        self.f * self.f.transpose()
    }

    /// Isochoric left Cauchy-Green tensor J^(-2/3) b.
    pub fn dev_left_cauchy_green(&self) -> Mat3 {
        self.left_cauchy_green() * self.j.powf(-2.0 / 3.0)
    }

    /// Copy of this state with a different deformation.
    pub fn with_deformation(&self, f: Mat3, j: f64) -> Self {
        Self {
            f,
            j,
            ..self.clone()
        }
    }
}

/// One generation of reactive bonds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Inverse deformation gradient at creation.
    pub fi: Mat3,
    /// Inverse Jacobian at creation.
    pub ji: f64,
    /// Creation time.
    pub time: f64,
    /// Mass fraction at creation.
    pub fraction: f64,
}

impl Generation {
    /// The generation present in the reference configuration.
    pub fn initial() -> Self {
        Self {
            fi: Mat3::identity(),
            ji: 1.0,
            time: 0.0,
            fraction: 1.0,
        }
    }
}

/// Model-specific history of an integration point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum History {
    #[default]
    None,
    /// Ordered bond generations, oldest first.
    Reactive(Vec<Generation>),
}

/// Per-integration-point record owned by a domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialPoint {
    pub elastic: ElasticState,
    pub history: History,
}

impl MaterialPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: History) -> Self {
        Self {
            elastic: ElasticState::default(),
            history,
        }
    }

    /// Live generations, empty for history-free models.
    pub fn generations(&self) -> &[Generation] {
        match &self.history {
            History::None => &[],
            History::Reactive(generations) => generations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_reference_state() {
        let pt = MaterialPoint::new();
        assert_eq!(pt.elastic.f, Mat3::identity());
        assert_relative_eq!(pt.elastic.j, 1.0);
        assert!(pt.generations().is_empty());
    }

    #[test]
    fn test_isochoric_left_cauchy_green_has_unit_determinant() {
        let f = Mat3::from_diagonal(&Vector3::new(1.2, 0.9, 1.1));
        let state = ElasticState::default().with_deformation(f, f.determinant());
        assert_relative_eq!(state.dev_left_cauchy_green().determinant(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(state.right_cauchy_green(), state.left_cauchy_green(), epsilon = 1e-14);
    }
}
