//! Per-message command processing.

use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::BusConfig;
use crate::envelope::{Datum, Envelope, Route};
use crate::error::{CommandError, Disposition, RemoteError};
use crate::service::ServiceFactory;
use crate::store::UnitOfWorkFactory;
use crate::transport::{ConsumedRecord, TransportError, TransportService};

/// Which pipeline a record was consumed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicRole {
    /// The commands topic.
    Primary,
    /// The failed-retry topic.
    Retry,
}

/// What happened to one consumed record. Every outcome is final for that
/// record: its offset is committed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Undecodable or without `data`.
    Skipped,
    /// Handler succeeded and its unit of work was committed.
    Committed,
    /// Terminal failure, reported to the caller if there is one.
    Rejected,
    /// Keyless routing failure: nobody to tell, nothing to do.
    Dropped,
    /// Infrastructure failure handed to the failed-retry topic.
    Requeued,
    /// Retries exhausted; moved to the dead-letter topic.
    DeadLettered,
}

/// How failed commands are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before forwarding a command that failed again on the retry topic.
    pub delay: Duration,
    /// Failures after which a command is dead-lettered. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Whether a command that has failed `attempts` times is done retrying.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(false, |max| attempts >= max)
    }
}

/// Decodes command envelopes, dispatches them to their handler, and settles
/// the outcome: resolve, reject, or hand over to the retry topic.
///
/// ## Example
///
/// ```ignore
/// let executor = Arc::new(CommandExecutor::from_config(factory, &config));
/// let handle = executor.spawn(
///     broker.consumer(&config.consumer_group, &config.commands_topic),
///     broker.consumer(&config.consumer_group, &config.failed_topic()),
///     config.poll_interval(),
/// );
/// // ...
/// let stats = handle.stop();
/// ```
pub struct CommandExecutor<F: UnitOfWorkFactory> {
    factory: ServiceFactory<F>,
    failed_topic: String,
    dead_letter_topic: String,
    policy: RetryPolicy,
}

impl<F: UnitOfWorkFactory> CommandExecutor<F> {
    pub fn new(
        factory: ServiceFactory<F>,
        failed_topic: impl Into<String>,
        dead_letter_topic: impl Into<String>,
    ) -> Self {
        Self {
            factory,
            failed_topic: failed_topic.into(),
            dead_letter_topic: dead_letter_topic.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn from_config(factory: ServiceFactory<F>, config: &BusConfig) -> Self {
        Self::new(factory, config.failed_topic(), config.dead_letter_topic())
            .with_retry_policy(config.retry_policy())
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn failed_topic(&self) -> &str {
        &self.failed_topic
    }

    pub fn dead_letter_topic(&self) -> &str {
        &self.dead_letter_topic
    }

    /// Process one record.
    ///
    /// Returns an error only when the outcome could not be made durable
    /// (the retry or dead-letter topic refused the message); the record
    /// must then not be committed.
    pub fn process(
        &self,
        record: &ConsumedRecord,
        role: TopicRole,
    ) -> Result<Outcome, TransportError> {
        let Some(envelope) = Envelope::decode(&record.value) else {
            return Ok(Outcome::Skipped);
        };
        if envelope.data.is_none() {
            warn!(
                "skipping {} at {}/{}@{}: no data",
                envelope.event, record.topic, record.partition, record.offset
            );
            return Ok(Outcome::Skipped);
        }

        let key = envelope.correlation_key().map(str::to_string);
        let result = envelope
            .route()
            .and_then(|route| self.dispatch(&route, envelope.args()));

        match result {
            Ok(value) => {
                debug!("{} committed", envelope.event);
                if let Some(key) = &key {
                    self.resolve(key, value);
                }
                Ok(Outcome::Committed)
            }
            Err(err) => match err.disposition() {
                Disposition::Reject(remote) => {
                    Ok(self.reject(&envelope.event, key.as_deref(), &err, remote))
                }
                Disposition::Retry => self.requeue(envelope, err.to_remote(), role),
            },
        }
    }

    /// Run the handler inside a fresh unit of work. The bundle is disposed
    /// on every path.
    fn dispatch(&self, route: &Route, args: &[Datum]) -> Result<Datum, CommandError> {
        let mut bundle = self.factory.bundle(&route.service)?;
        if !bundle.has_method(&route.method) {
            bundle.dispose();
            return Err(CommandError::Routing(format!(
                "{}.{}",
                route.service, route.method
            )));
        }

        let result = match bundle.invoke(&route.method, args) {
            Ok(value) => bundle.commit().map(|()| value),
            Err(err) => Err(err),
        };
        bundle.dispose();
        result
    }

    fn reject(
        &self,
        event: &str,
        key: Option<&str>,
        err: &CommandError,
        remote: RemoteError,
    ) -> Outcome {
        match key {
            Some(key) => {
                warn!("{} (key {}) rejected: {}", event, key, err);
                if let Err(e) = self.factory.producer().reject_command(key, remote) {
                    error!("failed to publish rejection for {}: {}", key, e);
                }
                Outcome::Rejected
            }
            None if matches!(err, CommandError::Routing(_)) => {
                warn!("dropping keyless {}: {}", event, err);
                Outcome::Dropped
            }
            None => {
                warn!("keyless {} rejected: {}", event, err);
                Outcome::Rejected
            }
        }
    }

    fn resolve(&self, key: &str, value: Datum) {
        if let Err(e) = self.factory.producer().resolve_command(key, value) {
            error!("failed to publish result for {}: {}", key, e);
        }
    }

    fn requeue(
        &self,
        envelope: Envelope,
        error: RemoteError,
        role: TopicRole,
    ) -> Result<Outcome, TransportError> {
        let retry = envelope.into_retry(error.clone());

        if self.policy.exhausted(retry.attempts) {
            self.transport().send(&self.dead_letter_topic, &retry)?;
            error!(
                "{} dead-lettered after {} attempts: {}",
                retry.event, retry.attempts, error
            );
            if let Some(key) = retry.correlation_key() {
                if let Err(e) = self.factory.producer().reject_command(key, error) {
                    error!("failed to publish rejection for {}: {}", key, e);
                }
            }
            return Ok(Outcome::DeadLettered);
        }

        if role == TopicRole::Retry {
            thread::sleep(self.policy.delay);
        }
        let written = self.transport().send(&self.failed_topic, &retry)?;
        info!(
            "{} requeued to {}/{} (attempt {}): {}",
            retry.event, written.topic, written.partition, retry.attempts, error
        );
        Ok(Outcome::Requeued)
    }

    fn transport(&self) -> &TransportService {
        self.factory.transport()
    }
}
