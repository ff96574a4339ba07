//! Command producer: sends commands and waits for their outcome.
//!
//! ## Example
//!
//! ```ignore
//! let producer = CommandProducer::new(transport, correlator, "commands", Duration::from_secs(30))?;
//!
//! let reply = producer
//!     .send_command("schools", "createSchool", vec![Datum::from_serializable(&input)?])
//!     .await?;
//! if !reply.done {
//!     // accepted, outcome not known yet
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::correlator::{Correlator, CorrelatorError, Signal, SignalChannel};
use crate::envelope::{Datum, Envelope, Route};
use crate::error::{CommandError, ErrorKind, RemoteError};
use crate::transport::{new_key, TransportError, TransportService};

type Outcome = Result<Datum, RemoteError>;
type PendingTable = DashMap<String, oneshot::Sender<Outcome>>;

/// Reply to [`CommandProducer::send_command`].
///
/// `done == false` means the command timed out: it was accepted by the
/// transport and may still be applied. `data` then carries the original args.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub done: bool,
    pub data: Datum,
}

#[derive(Debug, Error)]
pub enum CommandFailure {
    /// The executor rejected the command.
    #[error("command rejected: {0}")]
    Rejected(RemoteError),

    #[error("invalid route: {0}")]
    Routing(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Correlator(#[from] CorrelatorError),
}

impl CommandFailure {
    /// The remote error carried by a rejection.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            CommandFailure::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

/// Lets a handler propagate a failed follow-up command with `?`.
impl From<CommandFailure> for CommandError {
    fn from(failure: CommandFailure) -> Self {
        match failure {
            CommandFailure::Rejected(remote) => match remote.kind {
                ErrorKind::NotFound => CommandError::NotFound(remote.message),
                ErrorKind::Validation => CommandError::Validation(remote.message),
                ErrorKind::Unauthorized => CommandError::Unauthorized(remote.message),
                ErrorKind::Forbidden => CommandError::Forbidden(remote.message),
                ErrorKind::Conflict => CommandError::Conflict(remote.message),
                ErrorKind::Routing => CommandError::Routing(remote.message),
                ErrorKind::Internal => CommandError::Infrastructure(remote.message),
            },
            CommandFailure::Routing(message) => CommandError::Routing(message),
            other => CommandError::Infrastructure(other.to_string()),
        }
    }
}

/// Sends command envelopes and correlates resolve/reject signals with the
/// callers waiting on them.
///
/// Each waiting call owns one entry in the pending table, keyed by its
/// correlation key. Whichever of signal or timeout removes the entry first
/// decides the outcome; anything arriving later is ignored.
pub struct CommandProducer {
    transport: TransportService,
    correlator: Arc<dyn Correlator>,
    pending: Arc<PendingTable>,
    topic: String,
    timeout: Duration,
}

impl CommandProducer {
    /// Create a producer and subscribe it to both signal channels.
    pub fn new(
        transport: TransportService,
        correlator: Arc<dyn Correlator>,
        topic: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CorrelatorError> {
        let pending: Arc<PendingTable> = Arc::new(DashMap::new());

        let table = Arc::clone(&pending);
        correlator.subscribe(
            SignalChannel::Resolve,
            Box::new(move |signal: Signal| {
                let result = signal.result.unwrap_or_default();
                settle(&table, &signal.event_key, Ok(result));
            }),
        )?;

        let table = Arc::clone(&pending);
        correlator.subscribe(
            SignalChannel::Reject,
            Box::new(move |signal: Signal| {
                let error = signal
                    .error
                    .unwrap_or_else(|| RemoteError::new(ErrorKind::Internal, "command rejected"));
                settle(&table, &signal.event_key, Err(error));
            }),
        )?;

        Ok(Self {
            transport,
            correlator,
            pending,
            topic: topic.into(),
            timeout,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of callers currently waiting for a signal.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Send a command and wait for its resolve, reject, or timeout.
    pub async fn send_command(
        &self,
        service: &str,
        method: &str,
        args: Vec<Datum>,
    ) -> Result<CommandReply, CommandFailure> {
        let route = route(service, method)?;
        let key = new_key();
        let envelope = Envelope::command(&route, args, Some(key.clone()));

        // Registered before sending so an immediate signal finds its caller
        let (tx, mut rx) = oneshot::channel();
        self.pending.insert(key.clone(), tx);
        let entry = PendingEntry {
            table: &self.pending,
            key: &key,
        };

        self.transport.send(&self.topic, &envelope)?;
        debug!("awaiting {} (key {})", envelope.event, key);

        let outcome = match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(_)) => None,
            Err(_) => {
                if self.pending.remove(&key).is_some() {
                    None
                } else {
                    // A signal claimed the entry as the timer fired
                    rx.try_recv().ok()
                }
            }
        };
        drop(entry);

        match outcome {
            Some(Ok(data)) => Ok(CommandReply { done: true, data }),
            Some(Err(error)) => Err(CommandFailure::Rejected(error)),
            None => {
                warn!(
                    "{} (key {}) timed out after {:?}",
                    envelope.event, key, self.timeout
                );
                Ok(CommandReply {
                    done: false,
                    data: Datum::Array(envelope.data.unwrap_or_default()),
                })
            }
        }
    }

    /// Send a command without waiting for any outcome.
    pub fn send_command_async(
        &self,
        service: &str,
        method: &str,
        args: Vec<Datum>,
    ) -> Result<Envelope, CommandFailure> {
        let route = route(service, method)?;
        let envelope = Envelope::command(&route, args, Some(new_key()));
        self.transport.send(&self.topic, &envelope)?;
        Ok(envelope)
    }

    /// Send several invocations of one method under a shared key, as one batch.
    pub fn send_many_commands_async(
        &self,
        service: &str,
        method: &str,
        args_list: Vec<Vec<Datum>>,
    ) -> Result<Vec<Envelope>, CommandFailure> {
        let route = route(service, method)?;
        let key = new_key();
        let envelopes: Vec<Envelope> = args_list
            .into_iter()
            .map(|args| Envelope::command(&route, args, Some(key.clone())))
            .collect();
        self.transport.send_many(&self.topic, &envelopes)?;
        Ok(envelopes)
    }

    /// Publish a resolve signal for `key`.
    pub fn resolve_command(&self, key: &str, result: Datum) -> Result<(), CorrelatorError> {
        self.correlator
            .publish(SignalChannel::Resolve, &Signal::resolved(key, result))
    }

    /// Publish a reject signal for `key`.
    pub fn reject_command(&self, key: &str, error: RemoteError) -> Result<(), CorrelatorError> {
        self.correlator
            .publish(SignalChannel::Reject, &Signal::rejected(key, error))
    }
}

fn route(service: &str, method: &str) -> Result<Route, CommandFailure> {
    Route::new(service, method).map_err(|e| CommandFailure::Routing(e.to_string()))
}

fn settle(table: &PendingTable, key: &str, outcome: Outcome) {
    match table.remove(key) {
        Some((_, tx)) => {
            if tx.send(outcome).is_err() {
                debug!("caller for {} stopped waiting", key);
            }
        }
        None => debug!("no pending command for {}", key),
    }
}

/// Removes the pending entry however `send_command` exits, including when
/// its future is dropped.
struct PendingEntry<'a> {
    table: &'a PendingTable,
    key: &'a str,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.table.remove(self.key);
    }
}
