//! Bond relaxation laws g(t) of reactive materials.
//!
//! g(0) = 1 and g decays monotonically towards zero.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::material::params::{MaterialSpec, ParamDecl, ParamRange};

pub const EXPONENTIAL: &str = "relaxation-exponential";
pub const POWER: &str = "relaxation-power";

const TAU: ParamDecl = ParamDecl::required("tau", ParamRange::Greater(0.0));
const BETA: ParamDecl = ParamDecl::required("beta", ParamRange::Greater(0.0));

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondRelaxation {
    /// g = exp(-t/τ)
    Exponential { tau: f64 },
    /// g = (1 + t/τ)^(-β)
    Power { tau: f64, beta: f64 },
}

impl BondRelaxation {
    pub fn from_spec(spec: &MaterialSpec) -> Result<Self> {
        match spec.kind.as_str() {
            EXPONENTIAL => {
                spec.check_known(&[TAU])?;
                Ok(Self::Exponential { tau: spec.value(&TAU)? })
            }
            POWER => {
                spec.check_known(&[TAU, BETA])?;
                Ok(Self::Power {
                    tau: spec.value(&TAU)?,
                    beta: spec.value(&BETA)?,
                })
            }
            other => Err(Error::invalid_material(
                "kind",
                format!("unknown relaxation '{other}'"),
            )),
        }
    }

    /// Relaxation function at elapsed time `t` since bond formation.
    pub fn relaxation(&self, t: f64) -> f64 {
        let t = t.max(0.0);
        match *self {
            Self::Exponential { tau } => (-t / tau).exp(),
            Self::Power { tau, beta } => (1.0 + t / tau).powf(-beta),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential() {
        let g = BondRelaxation::Exponential { tau: 2.0 };
        assert_relative_eq!(g.relaxation(0.0), 1.0);
        assert_relative_eq!(g.relaxation(2.0), (-1.0f64).exp());
        assert_relative_eq!(g.relaxation(-1.0), 1.0);
    }

    #[test]
    fn test_power_decays_slower_than_exponential() {
        let p = BondRelaxation::Power { tau: 1.0, beta: 1.0 };
        let e = BondRelaxation::Exponential { tau: 1.0 };
        assert_relative_eq!(p.relaxation(1.0), 0.5);
        assert!(p.relaxation(10.0) > e.relaxation(10.0));
    }

    #[test]
    fn test_from_spec() {
        let spec = MaterialSpec::new(POWER).with("tau", 0.5).with("beta", 2.0);
        assert_eq!(
            BondRelaxation::from_spec(&spec).unwrap(),
            BondRelaxation::Power { tau: 0.5, beta: 2.0 }
        );
        assert!(BondRelaxation::from_spec(&MaterialSpec::new(EXPONENTIAL).with("tau", 0.0)).is_err());
        assert!(BondRelaxation::from_spec(&MaterialSpec::new("relaxation-Fung")).is_err());
    }
}
