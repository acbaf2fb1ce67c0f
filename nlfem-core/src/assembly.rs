//! Global system assembly.
//!
//! A [`GlobalSystem`] owns the sparsity profile of a model and the global
//! matrix allocated over it. The profile is built once from every element
//! and contact pair; contact pairs change as surfaces slide, so before each
//! stiffness assembly the contact footprint is checked against the profile
//! and the profile grows when a new pair appears.

use tracing::{debug, info};

use crate::error::Result;
use crate::model::Model;
use crate::profile::{SparseMatrixProfile, UpdateMethod};
use crate::sparse::{GlobalMatrix, GlobalVector};

#[derive(Debug, Clone)]
pub struct GlobalSystem {
    profile: SparseMatrixProfile,
    matrix: GlobalMatrix,
}

impl GlobalSystem {
    /// Build the profile from every element and current contact pair of an
    /// initialized model.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::Allocation`] if the profile or matrix
    /// storage cannot be obtained.
    pub fn new(model: &Model, method: UpdateMethod) -> Result<Self> {
        let dofs = model.dofs()?;
        let mut profile = SparseMatrixProfile::new(dofs.n_equations())?.with_method(method);
        profile.create_diagonal()?;
        profile.update_profile(&model.equation_lists(dofs))?;
        let matrix = GlobalMatrix::from_profile(&profile)?;
        info!(
            equations = profile.size(),
            nonzeros = matrix.nnz(),
            method = ?method,
            "sparsity profile built"
        );
        Ok(Self { profile, matrix })
    }

    pub fn n_equations(&self) -> usize {
        self.profile.size()
    }

    pub fn profile(&self) -> &SparseMatrixProfile {
        &self.profile
    }

    pub fn matrix(&self) -> &GlobalMatrix {
        &self.matrix
    }

    /// Grow the profile to cover the current contact pairs.
    ///
    /// Returns whether the profile changed, in which case the matrix has
    /// been reallocated.
    pub fn ensure_footprint(&mut self, model: &Model) -> Result<bool> {
        let dofs = model.dofs()?;
        let missing: Vec<Vec<isize>> = model
            .contact_equation_lists(dofs)
            .into_iter()
            .filter(|lm| !self.profile.covers(lm))
            .collect();
        if missing.is_empty() {
            return Ok(false);
        }
        for lm in &missing {
            self.profile.add_element(lm)?;
        }
        self.matrix = GlobalMatrix::from_profile(&self.profile)?;
        debug!(
            new_pairs = missing.len(),
            nonzeros = self.matrix.nnz(),
            "contact footprint grew"
        );
        Ok(true)
    }

    /// Out-of-balance force over the free dofs.
    pub fn residual(&self, model: &Model, inertia: bool) -> Result<GlobalVector> {
        model.residual(model.dofs()?, inertia)
    }

    /// Assemble the tangent K + `mass_factor` M, growing the profile first
    /// if the contact footprint changed.
    pub fn assemble_stiffness(&mut self, model: &Model, mass_factor: f64) -> Result<&GlobalMatrix> {
        self.ensure_footprint(model)?;
        model.stiffness(mass_factor, &mut self.matrix)?;
        Ok(&self.matrix)
    }
}
