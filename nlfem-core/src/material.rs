//! Constitutive models for finite-strain solids.
//!
//! Every model maps the deformation state of a [`MaterialPoint`] to the
//! Cauchy stress, the spatial elasticity tangent and the strain energy
//! density. Evaluation never mutates the point; models with history advance
//! it only in [`Material::commit`], which the analysis calls once per
//! converged time step.
//!
//! Models are created from a [`MaterialSpec`] by a [`MaterialRegistry`].
//!
//! # Submodules
//!
//! - [`neo_hookean`] - compressible neo-Hookean solid
//! - [`mooney_rivlin`] - uncoupled Mooney-Rivlin solid
//! - [`fiber_pow_linear`] - tension-only fiber with power-law toe region
//! - [`mixture`] - sum of solid components
//! - [`reactive_viscoelastic`] - uncoupled reactive viscoelastic solid
//! - [`relaxation`] - bond relaxation laws

use std::fmt::Debug;

use crate::types::{Mat3, Tangent};

pub mod fiber_pow_linear;
pub mod mixture;
pub mod mooney_rivlin;
pub mod neo_hookean;
pub mod params;
pub mod point;
pub mod reactive_viscoelastic;
pub mod registry;
pub mod relaxation;
pub mod uncoupled;

pub use fiber_pow_linear::FiberPowLinear;
pub use mixture::SolidMixture;
pub use mooney_rivlin::MooneyRivlin;
pub use neo_hookean::NeoHookean;
pub use params::{MaterialSpec, ParamDecl, ParamRange};
pub use point::{ElasticState, Generation, History, MaterialPoint};
pub use reactive_viscoelastic::{ReactiveViscoelastic, Trigger};
pub use registry::MaterialRegistry;
pub use relaxation::BondRelaxation;
pub use uncoupled::UncoupledSolid;

/// Constitutive model of a solid.
///
/// Materials are shared by the parallel element loops and must be
/// thread-safe (Send + Sync).
pub trait Material: Send + Sync + Debug {
    /// Registered kind tag.
    fn kind(&self) -> &'static str;

    /// Reference mass density.
    fn density(&self) -> f64;

    /// Cauchy stress.
    fn stress(&self, pt: &MaterialPoint) -> Mat3;

    /// Spatial elasticity tangent.
    fn tangent(&self, pt: &MaterialPoint) -> Tangent;

    /// Strain energy density per unit reference volume.
    fn strain_energy_density(&self, pt: &MaterialPoint) -> f64;

    /// Create the point data in the reference state.
    fn create_point(&self) -> MaterialPoint {
        MaterialPoint::new()
    }

    /// Advance history at a converged state.
    fn commit(&self, _pt: &mut MaterialPoint) {}
}

/// Material with a deviatoric/volumetric split of the strain energy,
/// W = W̃(C̃) + U(J).
///
/// The volumetric part is U(J) = k/2 (ln J)², added by [`UncoupledSolid`].
pub trait UncoupledMaterial: Send + Sync + Debug {
    fn kind(&self) -> &'static str;

    fn density(&self) -> f64;

    /// Bulk modulus k of the volumetric penalty.
    fn bulk_modulus(&self) -> f64;

    /// Deviatoric Cauchy stress.
    fn dev_stress(&self, pt: &MaterialPoint) -> Mat3;

    /// Deviatoric spatial tangent.
    fn dev_tangent(&self, pt: &MaterialPoint) -> Tangent;

    /// Deviatoric strain energy density.
    fn dev_strain_energy_density(&self, pt: &MaterialPoint) -> f64;

    fn create_point(&self) -> MaterialPoint {
        MaterialPoint::new()
    }

    fn commit(&self, _pt: &mut MaterialPoint) {}
}
