//! Error types for nlfem operations.

use thiserror::Error;

/// Result type alias using the nlfem Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, assembling or solving a model.
#[derive(Error, Debug)]
pub enum Error {
    /// A material parameter is outside its admissible range.
    #[error("invalid material parameter '{parameter}': {message}")]
    InvalidMaterial { parameter: String, message: String },

    /// Analysis or contact control parameters are inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Mesh-related errors.
    #[error("mesh error: {0}")]
    Mesh(String),

    /// Assembly errors. These indicate a structural bug and are never retried.
    #[error("assembly error: {0}")]
    Assembly(String),

    /// Storage for a global structure could not be obtained.
    #[error("allocation failure: could not reserve {requested} bytes")]
    Allocation { requested: usize },

    /// An element has a non-positive Jacobian at an integration point.
    #[error("degenerate element {element}: jacobian {jacobian:.3e}")]
    DegenerateElement { element: usize, jacobian: f64 },

    /// Newton or augmentation iterations did not converge.
    #[error("convergence failure at t = {time}: {reason}")]
    Convergence { time: f64, reason: String },

    /// Solver errors.
    #[error("solver error: {0}")]
    Solver(String),

    /// Matrix singularity or conditioning issues.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// A checkpoint could not be written, read or applied.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidMaterial`].
    pub fn invalid_material(parameter: &str, message: impl Into<String>) -> Self {
        Error::InvalidMaterial {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }

    /// Whether the failure can be retried with a smaller time step.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Convergence { .. }
                | Error::DegenerateElement { .. }
                | Error::Solver(_)
                | Error::SingularMatrix(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Checkpoint(err.to_string())
    }
}
