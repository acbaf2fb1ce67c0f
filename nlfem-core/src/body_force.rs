//! Body forces per unit mass.
//!
//! A body force contributes f_a = ∫ ρ0 N_a b(x) dV0 to the external forces.
//! Position-dependent forces also contribute stiffness through ∂b/∂x.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Mat3, Point3, Vec3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyForce {
    /// Uniform acceleration field, e.g. gravity.
    Constant { acceleration: Vec3 },
    /// Centrifugal loading of a body spinning about `axis` through `center`:
    /// b = ω² (I - n⊗n)(x - c).
    Centrifugal {
        angular_speed: f64,
        axis: Vec3,
        center: Point3,
    },
}

impl BodyForce {
    pub fn gravity(g: f64) -> Self {
        Self::Constant {
            acceleration: Vec3::new(0.0, 0.0, -g),
        }
    }

    pub fn centrifugal(angular_speed: f64, axis: Vec3, center: Point3) -> Result<Self> {
        if axis.norm() == 0.0 {
            return Err(Error::Config("centrifugal axis must be nonzero".into()));
        }
        Ok(Self::Centrifugal {
            angular_speed,
            axis: axis.normalize(),
            center,
        })
    }

    /// Force per unit mass at current position `x`.
    pub fn value(&self, x: &Point3) -> Vec3 {
        match self {
            Self::Constant { acceleration } => *acceleration,
            Self::Centrifugal { center, .. } => self.stiffness(x) * (x - center),
        }
    }

    /// Gradient ∂b/∂x.
    pub fn stiffness(&self, _x: &Point3) -> Mat3 {
        match self {
            Self::Constant { .. } => Mat3::zeros(),
            Self::Centrifugal {
                angular_speed, axis, ..
            } => {
                let n = axis.normalize();
                (Mat3::identity() - n * n.transpose()) * (angular_speed * angular_speed)
            }
        }
    }

    pub fn is_position_dependent(&self) -> bool {
        matches!(self, Self::Centrifugal { .. })
    }
}
