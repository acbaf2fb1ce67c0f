//! nlfem Core - nonlinear finite element engine for continuum solid mechanics
//!
//! Finite-strain implicit analysis library with:
//! - Hyperelastic, fiber, mixture and reactive viscoelastic materials
//! - Parallel element assembly using Rayon
//! - Profile-backed sparse matrices (CSR format)
//! - Sliding, self and periodic contact with augmented Lagrangian passes
//! - Newton time stepping with automatic step-size control and restart
//!
//! # Architecture
//!
//! The engine is built around these core abstractions:
//!
//! - [`Material`] trait: stress, spatial tangent and history commit of a
//!   [`MaterialPoint`], created by name through a [`MaterialRegistry`]
//! - [`ElasticSolidDomain`]: elements sharing a material, with their
//!   integration-point state
//! - [`ContactInterface`] trait: constraint forces and stiffness between
//!   surfaces
//! - [`SparseMatrixProfile`]: sparsity pattern fixed before the first
//!   assembly
//! - [`Model`] and [`Analysis`]: the assembled problem and its time stepping
//! - [`Solver`] trait: linear system solution strategies

pub mod types;
pub mod error;
pub mod mesh;
pub mod dof;
pub mod profile;
pub mod sparse;
pub mod element;
pub mod material;
pub mod body_force;
pub mod domain;
pub mod contact;
pub mod config;
pub mod model;
pub mod assembly;
pub mod solver;
pub mod analysis;
pub mod checkpoint;
pub mod stress;

pub use types::{Mat3, Point3, StrainTensor, StressTensor, Vec3};
pub use error::{Error, Result};
pub use mesh::{ElementType, Mesh};
pub use dof::DofTable;
pub use profile::{SparseMatrixProfile, UpdateMethod};
pub use sparse::{CsrMatrix, GlobalMatrix, GlobalVector};
pub use material::{Material, MaterialPoint, MaterialRegistry, MaterialSpec, UncoupledMaterial};
pub use body_force::BodyForce;
pub use domain::ElasticSolidDomain;
pub use contact::{ContactInterface, PeriodicInterface, SlidingInterface, Surface};
pub use config::{AnalysisConfig, ContactConfig, Integration};
pub use model::{LoadCurve, Model};
pub use assembly::GlobalSystem;
pub use solver::{Solver, SolverType};
pub use analysis::{Analysis, IterationOutcome, StepReport};
pub use checkpoint::Checkpoint;
pub use stress::{ResultSnapshot, StressField};
