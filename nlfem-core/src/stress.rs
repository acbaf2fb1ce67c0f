//! Result export.
//!
//! After a converged step the writer collects, per domain element and
//! integration point, the Cauchy stress kept by the last update together
//! with strain, strain energy density and the live bond generation count,
//! and per node the displacement and support reaction.
//!
//! Stresses live at the integration points. For nodal stress output,
//! [`compute_nodal_stresses`] averages the element means of the adjacent
//! elements.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::ElasticSolidDomain;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::model::Model;
use crate::types::{StrainTensor, StressTensor, Vec3};

/// Output of one integration point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointResult {
    /// Cauchy stress.
    pub stress: StressTensor,
    /// Green-Lagrange strain.
    pub strain: StrainTensor,
    pub jacobian: f64,
    pub strain_energy_density: f64,
    /// Live bond generations, 0 for history-free materials.
    pub generations: usize,
}

/// Stress result for a single element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementStress {
    /// Element index in the mesh.
    pub element_id: usize,
    pub points: Vec<PointResult>,
}

impl ElementStress {
    /// Mean stress over the integration points.
    pub fn average_stress(&self) -> StressTensor {
        if self.points.is_empty() {
            return StressTensor::zero();
        }
        let sum = self.points.iter().fold(StressTensor::zero().0, |s, p| s + p.stress.0);
        StressTensor(sum / self.points.len() as f64)
    }

    pub fn max_von_mises(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.stress.von_mises())
            .fold(0.0, f64::max)
    }
}

/// Stress results of one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressField {
    pub domain: String,
    pub element_stresses: Vec<ElementStress>,
}

impl StressField {
    /// Collect the point results of `domain` at its last update.
    ///
    /// # Errors
    ///
    /// Fails if the domain has no material.
    pub fn from_domain(domain: &ElasticSolidDomain) -> Result<Self> {
        let material = domain.require_material()?;
        let element_stresses = domain
            .elements()
            .par_iter()
            .enumerate()
            .map(|(e, &element_id)| ElementStress {
                element_id,
                points: domain
                    .element_points(e)
                    .iter()
                    .map(|pt| PointResult {
                        stress: StressTensor::from_matrix(&pt.elastic.stress),
                        strain: StrainTensor::green_lagrange(&pt.elastic.f),
                        jacobian: pt.elastic.j,
                        strain_energy_density: material.strain_energy_density(pt),
                        generations: pt.generations().len(),
                    })
                    .collect(),
            })
            .collect();
        Ok(Self {
            domain: domain.name().to_string(),
            element_stresses,
        })
    }

    /// Result of mesh element `element_id`, if it belongs to this domain.
    pub fn element(&self, element_id: usize) -> Option<&ElementStress> {
        self.element_stresses.iter().find(|es| es.element_id == element_id)
    }

    pub fn max_von_mises(&self) -> f64 {
        self.element_stresses
            .iter()
            .map(ElementStress::max_von_mises)
            .fold(0.0, f64::max)
    }

    pub fn average_stresses(&self) -> Vec<StressTensor> {
        self.element_stresses.iter().map(ElementStress::average_stress).collect()
    }

    pub fn n_elements(&self) -> usize {
        self.element_stresses.len()
    }

    /// Von Mises stress of each element mean.
    pub fn von_mises_stresses(&self) -> Vec<f64> {
        self.element_stresses
            .iter()
            .map(|es| es.average_stress().von_mises())
            .collect()
    }
}

/// Nodal stresses by equal-weight averaging of the adjacent element means.
///
/// Nodes outside every field get zero stress.
pub fn compute_nodal_stresses(mesh: &Mesh, fields: &[StressField]) -> Vec<StressTensor> {
    let mut sums = vec![StressTensor::zero().0; mesh.n_nodes()];
    let mut counts = vec![0usize; mesh.n_nodes()];

    for es in fields.iter().flat_map(|f| &f.element_stresses) {
        let mean = es.average_stress().0;
        for &node in &mesh.elements()[es.element_id].nodes {
            sums[node] += mean;
            counts[node] += 1;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| match count {
            0 => StressTensor::zero(),
            c => StressTensor(sum / c as f64),
        })
        .collect()
}

/// Everything the result writer receives after a converged step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub time: f64,
    pub displacement: Vec<Vec3>,
    pub velocity: Vec<Vec3>,
    /// Support reactions, zero at free dofs.
    pub reactions: Vec<Vec3>,
    pub fields: Vec<StressField>,
    /// Resultant slave-side force of each contact interface.
    pub contact_forces: Vec<Vec3>,
    pub strain_energy: f64,
}

impl ResultSnapshot {
    pub fn from_model(model: &Model) -> Result<Self> {
        Ok(Self {
            time: model.time(),
            displacement: model.displacement().to_vec(),
            velocity: model.velocity().to_vec(),
            reactions: model.reactions()?,
            fields: model
                .domains()
                .iter()
                .map(StressField::from_domain)
                .collect::<Result<_>>()?,
            contact_forces: model.contacts().iter().map(|c| c.contact_force()).collect(),
            strain_energy: model.strain_energy()?,
        })
    }

    /// Largest von Mises stress over all domains.
    pub fn max_von_mises(&self) -> f64 {
        self.fields.iter().map(StressField::max_von_mises).fold(0.0, f64::max)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
