use sea_orm::error::DbErr;
use serde::Serialize;

/// Error taxonomy for ledger operations.
///
/// Every variant aborts the enclosing database transaction; none are retried
/// internally. Callers surface `ValidationError`, `InsufficientStock`,
/// `LedgerLocked` and `OperationNotPermitted` as user-facing failures.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Requested quantity exceeds total available across all eligible batches.
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// A batch tied to the purchase has non-zero consumption; the whole
    /// purchase is immutable.
    #[error("Ledger locked: {0}")]
    LedgerLocked(String),

    /// Permanently refused operation, not a transient condition.
    #[error("Operation not permitted: {0}")]
    OperationNotPermitted(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn db_error<E: Into<DbErr>>(error: E) -> Self {
        ServiceError::DatabaseError(error.into())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}
