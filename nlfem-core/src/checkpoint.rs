//! Restart snapshots.
//!
//! A [`Checkpoint`] holds everything a converged state needs to continue:
//! time and step size, the nodal fields, every material point (deformation,
//! orientation and history generations) and every contact multiplier. The
//! step controller also uses it to roll back a failed step.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::material::MaterialPoint;
use crate::model::Model;
use crate::types::Vec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub time: f64,
    pub step_size: f64,
    pub displacement: Vec<Vec3>,
    pub velocity: Vec<Vec3>,
    pub acceleration: Vec<Vec3>,
    /// Material points of each domain, in domain order.
    pub domains: Vec<Vec<MaterialPoint>>,
    /// Flattened multipliers of each contact interface.
    pub multipliers: Vec<Vec<f64>>,
}

impl Checkpoint {
    /// Snapshot the current state of `model`.
    pub fn capture(model: &Model, step_size: f64) -> Self {
        Self {
            time: model.time(),
            step_size,
            displacement: model.displacement().to_vec(),
            velocity: model.velocity().to_vec(),
            acceleration: model.acceleration().to_vec(),
            domains: model.domains().iter().map(|d| d.points().to_vec()).collect(),
            multipliers: model.contacts().iter().map(|c| c.multipliers()).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn read_from(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Model {
    /// Put the model back into the state of `checkpoint`.
    ///
    /// The model must be initialized with the same mesh, domains and
    /// contacts the checkpoint was taken from. Contact projections are
    /// recomputed on the next [`Model::update`].
    ///
    /// # Errors
    ///
    /// Any size mismatch fails with [`Error::Checkpoint`] before the model
    /// is modified.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::Checkpoint("model is not initialized".into()));
        }
        if checkpoint.domains.len() != self.domains().len()
            || checkpoint.multipliers.len() != self.contacts().len()
        {
            return Err(Error::Checkpoint(format!(
                "checkpoint has {} domains and {} contacts, model has {} and {}",
                checkpoint.domains.len(),
                checkpoint.multipliers.len(),
                self.domains().len(),
                self.contacts().len()
            )));
        }
        for (domain, points) in self.domains().iter().zip(&checkpoint.domains) {
            if domain.points().len() != points.len() {
                return Err(Error::Checkpoint(format!(
                    "domain '{}' expects {} points, got {}",
                    domain.name(),
                    domain.points().len(),
                    points.len()
                )));
            }
        }
        for (contact, values) in self.contacts().iter().zip(&checkpoint.multipliers) {
            if contact.multipliers().len() != values.len() {
                return Err(Error::Checkpoint(format!(
                    "interface '{}' expects {} multipliers, got {}",
                    contact.name(),
                    contact.multipliers().len(),
                    values.len()
                )));
            }
        }

        self.set_state(
            checkpoint.time,
            checkpoint.displacement.clone(),
            checkpoint.velocity.clone(),
            checkpoint.acceleration.clone(),
        )?;
        for (domain, points) in self.domains_mut().iter_mut().zip(&checkpoint.domains) {
            domain.restore_points(points.clone())?;
        }
        for (contact, values) in self.contacts_mut().iter_mut().zip(&checkpoint.multipliers) {
            contact.set_multipliers(values)?;
        }
        debug!(time = checkpoint.time, "state restored");
        Ok(())
    }
}
