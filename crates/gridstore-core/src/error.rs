use crate::{
    db::cursor::CursorDecodeError,
    grid::GridError,
    kv::KvError,
    lock::LockError,
    schema::SchemaError,
};
use thiserror::Error as ThisError;

///
/// Error
///
/// The engine-level error taxonomy. Variants are grouped by what the
/// caller can do about them: fix the input (`Validation`, `UnknownField`,
/// constraint violations), re-read and retry (`Conflict`), back off and
/// retry (`LockTimeout`), or give up (`NotFound`, backend faults).
///
/// Every failure aborts the in-flight operation before any row, index, or
/// log mutation is committed; there is no partial-write state to clean up.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("validation failed for field `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("unique constraint violated on `{field}` (value `{value}`)")]
    UniquenessConflict { field: String, value: String },

    #[error("foreign key `{field}` (value `{value}`) does not resolve to a live record in `{table}`")]
    ForeignKeyViolation {
        field: String,
        table: String,
        value: String,
    },

    #[error("record `{id}` not found in `{table}`")]
    NotFound { table: String, id: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("unknown field `{field}` for table `{table}`")]
    UnknownField { table: String, field: String },

    #[error("timed out acquiring lock `{name}` after {waited_ms} ms")]
    LockTimeout { name: String, waited_ms: u64 },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error(transparent)]
    Cursor(#[from] CursorDecodeError),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<LockError> for Error {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { name, waited_ms } => Self::LockTimeout { name, waited_ms },
        }
    }
}

impl Error {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the same call without changing input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Conflict { .. })
    }
}
