//! Error taxonomy shared by every subsystem.

use thiserror::Error;

/// Result type used throughout `fleet-core`.
pub type FleetResult<T> = Result<T, FleetError>;

/// The error taxonomy from the control-plane contract: malformed input,
/// unknown resources, duplicate identity, missing capability, upstream
/// failure, structured validation, or an internal invariant violation.
#[derive(Error, Debug, Clone)]
pub enum FleetError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("validation failed")]
    Validation(crate::validation::ValidationReport),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Status class a synchronous HTTP boundary would map this to. `fleet-core`
    /// never constructs an HTTP response itself; this only exists so a thin
    /// router layer has a single place to look up the mapping from spec §6/§7.
    pub fn status_hint(&self) -> u16 {
        match self {
            FleetError::BadRequest(_) => 400,
            FleetError::NotFound(_) => 404,
            FleetError::AlreadyExists(_) => 409,
            FleetError::NotSupported(_) => 404,
            FleetError::Upstream(_) => 500,
            FleetError::Validation(_) => 400,
            FleetError::Internal(_) => 500,
        }
    }
}
