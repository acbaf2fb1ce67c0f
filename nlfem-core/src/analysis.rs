//! Nonlinear time stepping.
//!
//! [`Analysis`] marches a [`Model`] from its current time to the end time of
//! its [`AnalysisConfig`]. Each step runs nested iterations:
//!
//! 1. Full Newton on K Δu = R until the residual, energy and displacement
//!    norms meet their tolerances.
//! 2. One augmentation pass on every contact interface. If any interface
//!    updated its multipliers, Newton runs again.
//!
//! Every level reports a typed [`IterationOutcome`]. A step that ends in
//! `Diverged` or `StepTooLarge` is rolled back from a [`Checkpoint`] and
//! retried with a smaller step; history is committed only once the step
//! has converged.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::assembly::GlobalSystem;
use crate::checkpoint::Checkpoint;
use crate::config::{AnalysisConfig, Integration};
use crate::contact::{AugmentationReport, AugmentationStatus};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::solver::{solver_for, Solver};
use crate::types::Vec3;

/// Result of one level of the nested iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IterationOutcome {
    Converged { iterations: usize },
    /// Multipliers were updated; the equilibrium has to be found again.
    NeedsAugmentation { pass: usize },
    Diverged { reason: String },
    /// An element inverted; a smaller step may avoid it.
    StepTooLarge { reason: String },
}

impl IterationOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    fn reason(&self) -> String {
        match self {
            Self::Converged { .. } => "converged".into(),
            Self::NeedsAugmentation { pass } => format!("augmentation pass {pass} pending"),
            Self::Diverged { reason } | Self::StepTooLarge { reason } => reason.clone(),
        }
    }
}

/// Summary of a converged step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: usize,
    pub time: f64,
    pub step_size: f64,
    /// Newton iterations summed over all augmentation passes.
    pub iterations: usize,
    pub augmentation_passes: usize,
    /// Failed attempts before this one converged.
    pub retries: usize,
    /// Reports of the final augmentation pass, one per interface.
    pub augmentations: Vec<AugmentationReport>,
    /// Largest constraint violation over all interfaces, one entry per
    /// augmentation pass. Empty without interfaces.
    pub violations: Vec<f64>,
}

/// What one attempt at a step produced.
#[derive(Debug)]
struct Attempt {
    outcome: IterationOutcome,
    passes: usize,
    augmentations: Vec<AugmentationReport>,
    violations: Vec<f64>,
}

impl Attempt {
    fn failed(outcome: IterationOutcome, passes: usize) -> Self {
        Self {
            outcome,
            passes,
            augmentations: Vec::new(),
            violations: Vec::new(),
        }
    }
}

/// Newmark state of one step: the converged fields at the start of the step.
#[derive(Debug, Clone)]
struct Newmark {
    beta: f64,
    gamma: f64,
    dt: f64,
    u: Vec<Vec3>,
    v: Vec<Vec3>,
    a: Vec<Vec3>,
}

impl Newmark {
    fn start(integration: Integration, dt: f64, model: &Model) -> Option<Self> {
        match integration {
            Integration::Static => None,
            Integration::Newmark { beta, gamma } => Some(Self {
                beta,
                gamma,
                dt,
                u: model.displacement().to_vec(),
                v: model.velocity().to_vec(),
                a: model.acceleration().to_vec(),
            }),
        }
    }

    /// Coefficient of M in the effective tangent, ∂a/∂u.
    fn mass_factor(&self) -> f64 {
        1.0 / (self.beta * self.dt * self.dt)
    }

    /// Velocity and acceleration consistent with the trial displacement.
    fn update_kinematics(&self, model: &mut Model) {
        let (b, g, dt) = (self.beta, self.gamma, self.dt);
        let (velocity, acceleration): (Vec<Vec3>, Vec<Vec3>) = model
            .displacement()
            .iter()
            .zip(self.u.iter().zip(self.v.iter().zip(&self.a)))
            .map(|(u, (un, (vn, an)))| {
                let a = (u - un) / (b * dt * dt) - vn / (b * dt) - an * (0.5 / b - 1.0);
                let v = vn + (an * (1.0 - g) + a * g) * dt;
                (v, a)
            })
            .unzip();
        model.set_kinematics(velocity, acceleration);
    }
}

/// Map an evaluation failure onto an outcome the step controller can retry.
fn recover(result: Result<()>) -> Result<Option<IterationOutcome>> {
    match result {
        Ok(()) => Ok(None),
        Err(err @ Error::DegenerateElement { .. }) => Ok(Some(IterationOutcome::StepTooLarge {
            reason: err.to_string(),
        })),
        Err(err) if err.is_recoverable() => Ok(Some(IterationOutcome::Diverged {
            reason: err.to_string(),
        })),
        Err(err) => Err(err),
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Run one augmentation pass on every interface.
fn augment_contacts(model: &mut Model, pass: usize) -> (AugmentationStatus, Vec<AugmentationReport>) {
    let reports: Vec<AugmentationReport> = model
        .contacts_mut()
        .iter_mut()
        .map(|contact| contact.augment(pass))
        .collect();
    let status = reports
        .iter()
        .fold(AugmentationStatus::Converged, |acc, r| match (acc, r.status) {
            (AugmentationStatus::Exhausted, _) | (_, AugmentationStatus::Exhausted) => {
                AugmentationStatus::Exhausted
            }
            (AugmentationStatus::NeedsAugmentation, _) | (_, AugmentationStatus::NeedsAugmentation) => {
                AugmentationStatus::NeedsAugmentation
            }
            _ => AugmentationStatus::Converged,
        });
    (status, reports)
}

/// Nonlinear analysis driver.
pub struct Analysis {
    config: AnalysisConfig,
    solver: Box<dyn Solver>,
    pool: Option<rayon::ThreadPool>,
    /// Step size of the next attempt.
    step_size: f64,
    steps: usize,
}

impl fmt::Debug for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analysis")
            .field("config", &self.config)
            .field("solver", &self.solver.name())
            .field("step_size", &self.step_size)
            .field("steps", &self.steps)
            .finish()
    }
}

impl Analysis {
    /// # Errors
    ///
    /// Fails with [`Error::Config`] for invalid control parameters or if the
    /// worker pool cannot be started.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.n_threads {
            0 => None,
            n => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::Config(format!("cannot start {n} worker threads: {e}")))?,
            ),
        };
        Ok(Self {
            solver: solver_for(config.solver),
            step_size: config.step_size,
            config,
            pool,
            steps: 0,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Step size the next step will try.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Converged steps so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// March `model` to the end time.
    pub fn run(&mut self, model: &mut Model) -> Result<Vec<StepReport>> {
        self.run_with(model, |_, _| Ok(()))
    }

    /// Continue from a checkpoint, with the step size it recorded.
    pub fn resume(&mut self, model: &mut Model, checkpoint: &Checkpoint) -> Result<Vec<StepReport>> {
        model.restore(checkpoint)?;
        self.step_size = checkpoint.step_size.min(self.config.step_size);
        self.run(model)
    }

    /// March `model` to the end time, handing every converged state to
    /// `on_step`.
    ///
    /// # Errors
    ///
    /// [`Error::Convergence`] once a step cannot be completed within the
    /// retry budget; structural errors propagate immediately.
    pub fn run_with<F>(&mut self, model: &mut Model, mut on_step: F) -> Result<Vec<StepReport>>
    where
        F: FnMut(&Model, &StepReport) -> Result<()> + Send,
    {
        if !model.is_initialized() {
            model.initialize()?;
        }
        match self.pool.take() {
            Some(pool) => {
                let result = pool.install(|| self.march(model, &mut on_step));
                self.pool = Some(pool);
                result
            }
            None => self.march(model, &mut on_step),
        }
    }

    fn march<F>(&mut self, model: &mut Model, on_step: &mut F) -> Result<Vec<StepReport>>
    where
        F: FnMut(&Model, &StepReport) -> Result<()>,
    {
        let final_time = self.config.final_time();
        let eps = 1e-9 * self.config.step_size;
        model.update(model.time())?;
        let mut system = GlobalSystem::new(model, self.config.profile_method)?;
        info!(
            start = model.time(),
            final_time,
            step_size = self.step_size,
            solver = self.solver.name(),
            "analysis started"
        );

        let mut reports = Vec::new();
        while final_time - model.time() > eps {
            let report = self.step(model, &mut system, final_time)?;
            on_step(model, &report)?;
            reports.push(report);
        }
        info!(steps = reports.len(), time = model.time(), "analysis finished");
        Ok(reports)
    }

    /// Advance one converged step, cutting back on failure.
    fn step(&mut self, model: &mut Model, system: &mut GlobalSystem, final_time: f64) -> Result<StepReport> {
        let start = Checkpoint::capture(model, self.step_size);
        let nominal = self.config.step_size;
        let mut retries = 0;
        loop {
            let dt = self.step_size.min(final_time - start.time);
            let Attempt {
                outcome,
                passes,
                augmentations,
                violations,
            } = self.attempt(model, system, dt)?;
            match outcome {
                IterationOutcome::Converged { iterations } => {
                    model.commit()?;
                    self.steps += 1;
                    info!(
                        step = self.steps,
                        time = model.time(),
                        dt,
                        iterations,
                        passes,
                        retries,
                        "step converged"
                    );
                    if iterations <= self.config.optimal_iterations && self.step_size < nominal {
                        self.step_size = (self.step_size * self.config.growth).min(nominal);
                        debug!(step_size = self.step_size, "step size grown");
                    }
                    return Ok(StepReport {
                        step: self.steps,
                        time: model.time(),
                        step_size: dt,
                        iterations,
                        augmentation_passes: passes,
                        retries,
                        augmentations,
                        violations,
                    });
                }
                failure => {
                    model.restore(&start)?;
                    retries += 1;
                    let reason = failure.reason();
                    let next = dt * self.config.cutback;
                    if retries > self.config.max_retries || next < self.config.min_step_size {
                        error!(time = start.time + dt, retries, %reason, "step abandoned");
                        return Err(Error::Convergence {
                            time: start.time + dt,
                            reason,
                        });
                    }
                    warn!(time = start.time + dt, dt = next, retries, %reason, "step failed, cutting back");
                    self.step_size = next;
                }
            }
        }
    }

    /// One attempt at the step ending at `model.time() + dt`.
    fn attempt(
        &self,
        model: &mut Model,
        system: &mut GlobalSystem,
        dt: f64,
    ) -> Result<Attempt> {
        let time = model.time() + dt;
        let newmark = Newmark::start(self.config.integration, dt, model);
        model.apply_prescribed(time);
        if let Some(nm) = &newmark {
            nm.update_kinematics(model);
        }
        if let Some(outcome) = recover(model.update(time))? {
            return Ok(Attempt::failed(outcome, 0));
        }

        let mut iterations = 0;
        let mut pass = 0;
        let mut violations = Vec::new();
        loop {
            match self.newton(model, system, time, newmark.as_ref())? {
                IterationOutcome::Converged { iterations: n } => iterations += n,
                failure => return Ok(Attempt::failed(failure, pass)),
            }
            let (status, reports) = augment_contacts(model, pass);
            if !reports.is_empty() {
                violations.push(reports.iter().map(|r| r.max_gap).fold(0.0, f64::max));
            }
            pass += 1;
            let outcome = match status {
                AugmentationStatus::Converged => IterationOutcome::Converged { iterations },
                AugmentationStatus::NeedsAugmentation => IterationOutcome::NeedsAugmentation { pass },
                AugmentationStatus::Exhausted => IterationOutcome::Diverged {
                    reason: format!("augmentation did not settle in {pass} passes"),
                },
            };
            if !matches!(outcome, IterationOutcome::NeedsAugmentation { .. }) {
                return Ok(Attempt {
                    outcome,
                    passes: pass,
                    augmentations: reports,
                    violations,
                });
            }
        }
    }

    /// Full Newton iterations at fixed multipliers.
    fn newton(
        &self,
        model: &mut Model,
        system: &mut GlobalSystem,
        time: f64,
        newmark: Option<&Newmark>,
    ) -> Result<IterationOutcome> {
        let c = &self.config;
        let inertia = newmark.is_some();
        let mass_factor = newmark.map_or(0.0, Newmark::mass_factor);

        let mut r = system.residual(model, inertia)?;
        let r0 = r.dot(&r);
        if !r0.is_finite() {
            return Ok(IterationOutcome::Diverged {
                reason: "initial residual is not finite".into(),
            });
        }
        if r0.sqrt() < c.absolute_tolerance {
            return Ok(IterationOutcome::Converged { iterations: 0 });
        }

        let mut total = vec![0.0; r.len()];
        let mut e0 = 0.0;
        for iteration in 1..=c.max_iterations {
            let k = system.assemble_stiffness(model, mass_factor)?;
            let du = match self.solver.solve(k.csr(), r.as_slice()) {
                Ok(du) => du,
                Err(err) if err.is_recoverable() => {
                    return Ok(IterationOutcome::Diverged { reason: err.to_string() })
                }
                Err(err) => return Err(err),
            };
            if iteration == 1 {
                e0 = dot(&du, r.as_slice()).abs();
            }

            model.apply_increment(&du)?;
            if let Some(nm) = newmark {
                nm.update_kinematics(model);
            }
            if let Some(outcome) = recover(model.update(time))? {
                return Ok(outcome);
            }
            r = system.residual(model, inertia)?;

            for (t, d) in total.iter_mut().zip(&du) {
                *t += d;
            }
            let norm_r = r.dot(&r);
            let norm_e = dot(&du, r.as_slice()).abs();
            let norm_du = dot(&du, &du);
            let norm_u = dot(&total, &total);
            debug!(
                iteration,
                residual = norm_r.sqrt(),
                energy = norm_e,
                displacement = norm_du.sqrt(),
                "newton iteration"
            );
            if !(norm_r.is_finite() && norm_e.is_finite()) {
                return Ok(IterationOutcome::Diverged {
                    reason: format!("residual is not finite at iteration {iteration}"),
                });
            }

            let residual_ok = c.residual_tolerance <= 0.0 || norm_r <= c.residual_tolerance.powi(2) * r0;
            let energy_ok = norm_e <= c.energy_tolerance * e0;
            let displacement_ok = norm_du <= c.displacement_tolerance.powi(2) * norm_u;
            if norm_r.sqrt() < c.absolute_tolerance || (residual_ok && energy_ok && displacement_ok) {
                return Ok(IterationOutcome::Converged { iterations: iteration });
            }
        }
        Ok(IterationOutcome::Diverged {
            reason: format!("no convergence in {} iterations", c.max_iterations),
        })
    }
}
