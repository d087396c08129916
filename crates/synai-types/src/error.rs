use thiserror::Error;

use crate::job::{JobEvent, JobStatus};

/// Coarse error category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Validation,
    Internal,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("State transition error: cannot apply {event:?} to a job in state {from:?}")]
    InvalidStateTransition { from: JobStatus, event: JobEvent },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::JobNotFound(_)
            | RelayError::AgentNotFound(_)
            | RelayError::OwnerNotFound(_) => ErrorKind::NotFound,
            RelayError::Forbidden(_) => ErrorKind::Forbidden,
            RelayError::InvalidStateTransition { .. }
            | RelayError::MissingField(_)
            | RelayError::Validation(_) => ErrorKind::Validation,
            RelayError::Wallet(_)
            | RelayError::Storage(_)
            | RelayError::Serialization(_)
            | RelayError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        RelayError::Forbidden(msg.into())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
