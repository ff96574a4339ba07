//! Pub/sub correlator: carries command results back to the caller.
//!
//! Two named channels, `resolveCommand` and `rejectCommand`, each carrying a
//! [`Signal`] keyed by the command's correlation key. Signals are not
//! persisted; a signal nobody is waiting for is dropped by the receiver.

mod local;
#[cfg(feature = "emitter")]
mod emitter;

pub use local::LocalCorrelator;
#[cfg(feature = "emitter")]
pub use emitter::EmitterCorrelator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::Datum;
use crate::error::RemoteError;

/// One of the two result channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalChannel {
    Resolve,
    Reject,
}

impl SignalChannel {
    /// Wire name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            SignalChannel::Resolve => "resolveCommand",
            SignalChannel::Reject => "rejectCommand",
        }
    }
}

/// Result or error for one correlation key.
///
/// ```json
/// { "eventKey": "Zq3v0Xh2kPa9Lm4Rt7Yw", "result": { "_id": "X_AB12" } }
/// { "eventKey": "Zq3v0Xh2kPa9Lm4Rt7Yw", "error": { "kind": "conflict", "status": 409, "message": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub event_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Datum>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl Signal {
    pub fn resolved(event_key: impl Into<String>, result: Datum) -> Self {
        Self {
            event_key: event_key.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn rejected(event_key: impl Into<String>, error: RemoteError) -> Self {
        Self {
            event_key: event_key.into(),
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Error)]
pub enum CorrelatorError {
    #[error("signal serialization failed: {0}")]
    SerializationFailed(String),

    #[error("correlator lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("correlator unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for CorrelatorError {
    fn from(err: serde_json::Error) -> Self {
        CorrelatorError::SerializationFailed(err.to_string())
    }
}

/// Callback invoked for every signal on a subscribed channel.
pub type SignalHandler = Box<dyn Fn(Signal) + Send + Sync>;

/// A lightweight publish/subscribe bus for command results.
///
/// Implementations might include:
/// - `LocalCorrelator` - synchronous, in-process
/// - `EmitterCorrelator` - in-process, delivery on emitter threads
/// - a Redis pub/sub client for producer and executor in separate processes
pub trait Correlator: Send + Sync {
    /// Publish a signal on a channel.
    fn publish(&self, channel: SignalChannel, signal: &Signal) -> Result<(), CorrelatorError>;

    /// Register a handler for every future signal on a channel.
    fn subscribe(&self, channel: SignalChannel, handler: SignalHandler)
        -> Result<(), CorrelatorError>;
}
