//! Error taxonomy for the repository store.

use thiserror::Error;

/// Errors raised by repository store operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A schema CHECK or UNIQUE constraint rejected a write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A read found the database in a state its own invariants forbid
    /// (e.g. `decrypted=1` with `downloaded=0`).
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// A caller passed a status update with every field unset.
    #[error("status update must set at least one field")]
    EmptyStatusUpdate,

    /// The underlying SQLite driver failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem I/O failure during reconciliation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A timestamp stored in the database could not be interpreted.
    #[error("invalid timestamp in row: {0}")]
    InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, RepoError>;
