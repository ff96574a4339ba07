//! Command envelope: the unit of work on the transport.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "event": "createSchool_schools",
//!   "timestamp": 1725179400000,
//!   "data": [{ "name": "X" }],
//!   "v": "1.0.0",
//!   "key": "Zq3v0Xh2kPa9Lm4Rt7Yw"
//! }
//! ```
//!
//! `event` is `"<method>_<service>"` and must split into exactly two tokens.
//! `data` is positional. `key` is absent for fire-and-forget envelopes.
//! Envelopes on the failed-retry topic additionally carry `error` and `attempts`.

mod datum;

pub use datum::Datum;

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{CommandError, RemoteError};

/// Current envelope schema version.
pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Target of a command: a method on a named service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub service: String,
    pub method: String,
}

impl Route {
    /// Build a route, rejecting tokens that could not be decoded again.
    pub fn new(service: &str, method: &str) -> Result<Self, CommandError> {
        if !valid_token(service) || !valid_token(method) {
            return Err(CommandError::Routing(format!(
                "invalid route {}.{}",
                service, method
            )));
        }
        Ok(Self {
            service: service.to_string(),
            method: method.to_string(),
        })
    }

    /// Decode an `event` field.
    pub fn parse(event: &str) -> Result<Self, CommandError> {
        let tokens: Vec<&str> = event.split('_').collect();
        match tokens.as_slice() {
            [method, service] if !method.is_empty() && !service.is_empty() => Ok(Self {
                service: service.to_string(),
                method: method.to_string(),
            }),
            _ => Err(CommandError::Routing(format!("malformed event {:?}", event))),
        }
    }

    /// Encode as an `event` field.
    pub fn event(&self) -> String {
        format!("{}_{}", self.method, self.service)
    }
}

/// A token is valid when it is non-empty and contains no separator.
pub(crate) fn valid_token(token: &str) -> bool {
    !token.is_empty() && !token.contains('_')
}

fn default_version() -> String {
    ENVELOPE_VERSION.to_string()
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// A serialized command or update record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Datum>>,
    #[serde(default = "default_version")]
    pub v: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Last failure, set on failed-retry messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
    /// Number of failed executions so far.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: u32,
}

impl Envelope {
    /// Create a command envelope for `route`.
    pub fn command(route: &Route, args: Vec<Datum>, key: Option<String>) -> Self {
        Self::with_event(route.event(), args, key)
    }

    /// Create a keyless update envelope.
    pub fn update(event: impl Into<String>, data: Vec<Datum>) -> Self {
        Self::with_event(event.into(), data, None)
    }

    fn with_event(event: String, data: Vec<Datum>, key: Option<String>) -> Self {
        Self {
            event,
            timestamp: Utc::now().timestamp_millis(),
            data: Some(data),
            v: default_version(),
            key,
            error: None,
            attempts: 0,
        }
    }

    /// The correlation key, if the sender expects a reply.
    pub fn correlation_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn route(&self) -> Result<Route, CommandError> {
        Route::parse(&self.event)
    }

    pub fn args(&self) -> &[Datum] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode a transport payload. Undecodable payloads are logged and
    /// yield `None` so the consumer can acknowledge and move on.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                warn!("dropping undecodable envelope: {}", e);
                None
            }
        }
    }

    /// Derive the failed-retry message for this envelope.
    pub fn into_retry(mut self, error: RemoteError) -> Self {
        self.error = Some(error);
        self.attempts += 1;
        self
    }
}
