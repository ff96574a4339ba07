//! Error taxonomy for command handlers.
//!
//! Handlers return `Result<Datum, CommandError>`. The executor never inspects
//! error messages; it asks each error for its [`Disposition`]:
//!
//! - business errors (not found, validation, auth, conflict) are terminal and
//!   rejected back to the caller,
//! - duplicate-key errors are mapped to an "already exists" conflict and are
//!   terminal too, which is what makes re-delivered creates idempotent,
//! - routing errors (unknown service or method) are terminal,
//! - everything else is infrastructure and goes to the failed-retry topic.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;

/// Coarse error class carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unauthorized,
    Forbidden,
    Conflict,
    Routing,
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for the class.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::Conflict => 409,
            ErrorKind::Routing => 404,
            ErrorKind::Internal => 500,
        }
    }
}

/// The error payload of a `rejectCommand` signal.
///
/// This is what a waiting caller receives when its command fails terminally,
/// and what the failed-retry topic stores alongside a requeued envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.status_code(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for RemoteError {}

/// What the executor does with a failed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Terminal: report to the caller once, commit the offset, never retry.
    Reject(RemoteError),
    /// Non-terminal: forward to the failed-retry topic.
    Retry,
}

/// Error type for command handler operations.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage-level unique constraint violation.
    #[error("{collection} {id} already exists")]
    DuplicateKey { collection: String, id: String },

    /// Unknown service or method.
    #[error("service not found: {0}")]
    Routing(String),

    /// Positional argument missing or of the wrong shape.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::NotFound(_) => ErrorKind::NotFound,
            CommandError::Validation(_) | CommandError::DecodeFailed(_) => ErrorKind::Validation,
            CommandError::Unauthorized(_) => ErrorKind::Unauthorized,
            CommandError::Forbidden(_) => ErrorKind::Forbidden,
            CommandError::Conflict(_) | CommandError::DuplicateKey { .. } => ErrorKind::Conflict,
            CommandError::Routing(_) => ErrorKind::Routing,
            CommandError::Infrastructure(_) => ErrorKind::Internal,
        }
    }

    /// Whether the executor reports this error instead of retrying it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommandError::Infrastructure(_))
    }

    pub fn to_remote(&self) -> RemoteError {
        RemoteError::new(self.kind(), self.to_string())
    }

    pub fn disposition(&self) -> Disposition {
        if self.is_terminal() {
            Disposition::Reject(self.to_remote())
        } else {
            Disposition::Retry
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { collection, id } => {
                CommandError::DuplicateKey { collection, id }
            }
            StoreError::NotFound { collection, id } => {
                CommandError::NotFound(format!("{} {}", collection, id))
            }
            StoreError::InvalidDocument(reason) => CommandError::Validation(reason),
            other => CommandError::Infrastructure(other.to_string()),
        }
    }
}

/// Handlers that publish (follow-up commands, update events) fail with an
/// infrastructure error when the transport is down.
impl From<TransportError> for CommandError {
    fn from(err: TransportError) -> Self {
        CommandError::Infrastructure(err.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::DecodeFailed(err.to_string())
    }
}
