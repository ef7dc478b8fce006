//! Collaborator-level error types.
//!
//! Every external collaborator (document store, tax service, exchange rates,
//! party accounts, invoice lifecycle) reports failures with `AppError`.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Referenced document or record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid field on a document.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tax or exchange-rate computation failed.
    #[error("Computation error: {0}")]
    Computation(String),

    /// A store write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Conflicting document configuration (e.g., duplicate links).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External service error.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code for reports.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Computation(_) => "COMPUTATION_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true for errors that leave the store untouched and may be
    /// resolved by re-running the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::ExternalService(_))
    }
}
