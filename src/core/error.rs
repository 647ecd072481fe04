use thiserror::Error;

use crate::data::{DatabaseError, RunStatus};

/// Errors raised by trace store operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Run {0} not found")]
    RunNotFound(i64),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Run {run_id} cannot move from {from} to {to}")]
    InvalidTransition {
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
    },

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl From<rusqlite::Error> for TraceError {
    fn from(err: rusqlite::Error) -> Self {
        TraceError::Storage(DatabaseError::Sqlite(err))
    }
}

impl TraceError {
    pub fn validation(message: impl Into<String>) -> Self {
        TraceError::Validation(message.into())
    }

    /// Caller-correctable errors, as opposed to storage failures
    pub fn is_client_error(&self) -> bool {
        !matches!(self, TraceError::Storage(_))
    }
}
