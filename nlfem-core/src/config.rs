//! Analysis and contact control parameters.
//!
//! Both configurations deserialize from the loader's parsed input and carry
//! defaults for every field, so a partial document is valid. Call
//! `validate()` before use; out-of-range values fail with [`Error::Config`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::profile::UpdateMethod;
use crate::solver::SolverType;

/// Time integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Integration {
    /// Quasi-static: no inertia.
    #[default]
    Static,
    /// Newmark β/γ with consistent mass.
    Newmark { beta: f64, gamma: f64 },
}

impl Integration {
    /// Average acceleration (trapezoidal) rule, β = 1/4, γ = 1/2.
    pub fn trapezoidal() -> Self {
        Self::Newmark { beta: 0.25, gamma: 0.5 }
    }
}

/// Controls of the time-stepping and Newton iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of nominal time steps.
    pub time_steps: usize,
    /// Nominal step size.
    pub step_size: f64,
    /// Smallest step size the controller may cut back to.
    pub min_step_size: f64,
    /// Retries of a failed step before the analysis is abandoned.
    pub max_retries: usize,
    /// Factor applied to the step size on a retry, in (0, 1).
    pub cutback: f64,
    /// Factor applied after an easy step while below the nominal size.
    pub growth: f64,
    /// Steps converging within this many iterations count as easy.
    pub optimal_iterations: usize,
    /// Newton iterations per attempt.
    pub max_iterations: usize,
    /// Relative displacement tolerance.
    pub displacement_tolerance: f64,
    /// Relative energy tolerance.
    pub energy_tolerance: f64,
    /// Relative residual tolerance, 0 disables the check.
    pub residual_tolerance: f64,
    /// Residual norm below which an iteration is converged outright.
    pub absolute_tolerance: f64,
    pub integration: Integration,
    pub solver: SolverType,
    pub profile_method: UpdateMethod,
    /// Worker threads for the element loops, 0 uses the Rayon default.
    pub n_threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_steps: 10,
            step_size: 0.1,
            min_step_size: 1e-8,
            max_retries: 5,
            cutback: 0.5,
            growth: 1.5,
            optimal_iterations: 10,
            max_iterations: 25,
            displacement_tolerance: 1e-3,
            energy_tolerance: 1e-2,
            residual_tolerance: 0.0,
            absolute_tolerance: 1e-10,
            integration: Integration::Static,
            solver: SolverType::Auto,
            profile_method: UpdateMethod::Incremental,
            n_threads: 0,
        }
    }
}

impl AnalysisConfig {
    /// Quasi-static loading over `time_steps` steps of `step_size`.
    pub fn quasi_static(time_steps: usize, step_size: f64) -> Self {
        Self {
            time_steps,
            step_size,
            ..Default::default()
        }
    }

    /// Tight tolerances for verification problems.
    pub fn precise() -> Self {
        Self {
            displacement_tolerance: 1e-8,
            energy_tolerance: 1e-10,
            residual_tolerance: 1e-10,
            absolute_tolerance: 1e-12,
            ..Default::default()
        }
    }

    /// End time of the analysis.
    pub fn final_time(&self) -> f64 {
        self.time_steps as f64 * self.step_size
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));
        if self.time_steps == 0 {
            return fail("time_steps must be at least 1".into());
        }
        if !(self.step_size > 0.0) {
            return fail(format!("step_size = {} must be positive", self.step_size));
        }
        if !(self.min_step_size > 0.0 && self.min_step_size <= self.step_size) {
            return fail(format!(
                "min_step_size = {} must be in (0, step_size]",
                self.min_step_size
            ));
        }
        if !(self.cutback > 0.0 && self.cutback < 1.0) {
            return fail(format!("cutback = {} must be in (0, 1)", self.cutback));
        }
        if !(self.growth >= 1.0) {
            return fail(format!("growth = {} must be >= 1", self.growth));
        }
        if self.max_iterations == 0 {
            return fail("max_iterations must be at least 1".into());
        }
        for (name, tol) in [
            ("displacement_tolerance", self.displacement_tolerance),
            ("energy_tolerance", self.energy_tolerance),
            ("residual_tolerance", self.residual_tolerance),
            ("absolute_tolerance", self.absolute_tolerance),
        ] {
            if !(tol >= 0.0) {
                return fail(format!("{name} = {tol} must be non-negative"));
            }
        }
        if let Integration::Newmark { beta, gamma } = self.integration {
            if !(beta > 0.0 && beta <= 0.5) {
                return fail(format!("Newmark beta = {beta} must be in (0, 0.5]"));
            }
            if !(gamma >= 0.5 && gamma <= 1.0) {
                return fail(format!("Newmark gamma = {gamma} must be in [0.5, 1]"));
            }
        }
        Ok(())
    }
}

/// Controls of a contact interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    /// Penalty factor ε.
    pub penalty: f64,
    /// Update multipliers between Newton solves; plain penalty otherwise.
    pub augmented_lagrangian: bool,
    /// Relative change of the multiplier norm that ends augmentation.
    pub augmentation_tolerance: f64,
    /// Largest gap that ends augmentation, 0 disables the check.
    pub gap_tolerance: f64,
    pub min_augmentations: usize,
    /// Pass budget; exceeding it fails the step.
    pub max_augmentations: usize,
    /// Largest distance to a master point that still counts, unlimited if unset.
    pub search_radius: Option<f64>,
    /// Widening of the facet in natural coordinates during projection.
    pub search_tolerance: f64,
    /// Also project the master surface onto the slave surface.
    pub two_pass: bool,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            penalty: 1.0,
            augmented_lagrangian: true,
            augmentation_tolerance: 0.01,
            gap_tolerance: 0.0,
            min_augmentations: 0,
            max_augmentations: 10,
            search_radius: None,
            search_tolerance: 0.01,
            two_pass: false,
        }
    }
}

impl ContactConfig {
    pub fn with_penalty(penalty: f64) -> Self {
        Self {
            penalty,
            ..Default::default()
        }
    }

    /// Penalty-only enforcement, no augmentation passes.
    pub fn penalty_only(penalty: f64) -> Self {
        Self {
            penalty,
            augmented_lagrangian: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.penalty > 0.0 && self.penalty.is_finite()) {
            return Err(Error::Config(format!("penalty = {} must be positive", self.penalty)));
        }
        if !(self.augmentation_tolerance >= 0.0) || !(self.gap_tolerance >= 0.0) {
            return Err(Error::Config("augmentation tolerances must be non-negative".into()));
        }
        if self.max_augmentations < self.min_augmentations {
            return Err(Error::Config(format!(
                "max_augmentations = {} is below min_augmentations = {}",
                self.max_augmentations, self.min_augmentations
            )));
        }
        if let Some(r) = self.search_radius {
            if !(r > 0.0) {
                return Err(Error::Config(format!("search_radius = {r} must be positive")));
            }
        }
        if !(self.search_tolerance >= 0.0) {
            return Err(Error::Config("search_tolerance must be non-negative".into()));
        }
        Ok(())
    }
}
