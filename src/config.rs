//! Bus configuration.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::RetryPolicy;
use crate::transport::TopicSpec;

/// Environment variable prefix read by [`BusConfig::from_env`].
pub const ENV_PREFIX: &str = "SCHOOLBUS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: String, value: String },
}

/// Topic names, partitioning and timing for the whole bus.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use schoolbus::BusConfig;
///
/// let config = BusConfig::from_json(r#"{ "commands_topic": "school-commands" }"#).unwrap();
/// assert_eq!(config.failed_topic(), "school-commands_db_failed");
/// assert_eq!(config.partitions, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub commands_topic: String,
    pub updates_topic: String,
    pub partitions: u32,
    pub command_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub retry_delay_ms: u64,
    /// `None` retries failed commands forever.
    pub max_retry_attempts: Option<u32>,
    pub consumer_group: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            commands_topic: "commands".to_string(),
            updates_topic: "updates".to_string(),
            partitions: 3,
            command_timeout_ms: 30_000,
            poll_interval_ms: 50,
            retry_delay_ms: 1_000,
            max_retry_attempts: None,
            consumer_group: "command-executor".to_string(),
        }
    }
}

impl BusConfig {
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Defaults overridden by `SCHOOLBUS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `SCHOOLBUS_*` variable name.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}{}", ENV_PREFIX, suffix);
            lookup(&name).map(|value| (name, value))
        };
        let mut config = Self::default();

        if let Some((_, value)) = var("COMMANDS_TOPIC") {
            config.commands_topic = value;
        }
        if let Some((_, value)) = var("UPDATES_TOPIC") {
            config.updates_topic = value;
        }
        if let Some((_, value)) = var("CONSUMER_GROUP") {
            config.consumer_group = value;
        }
        if let Some((name, value)) = var("PARTITIONS") {
            config.partitions = parse(name, value)?;
        }
        if let Some((name, value)) = var("COMMAND_TIMEOUT_MS") {
            config.command_timeout_ms = parse(name, value)?;
        }
        if let Some((name, value)) = var("POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse(name, value)?;
        }
        if let Some((name, value)) = var("RETRY_DELAY_MS") {
            config.retry_delay_ms = parse(name, value)?;
        }
        if let Some((name, value)) = var("MAX_RETRY_ATTEMPTS") {
            config.max_retry_attempts = Some(parse(name, value)?);
        }
        Ok(config)
    }

    pub fn with_commands_topic(mut self, topic: impl Into<String>) -> Self {
        self.commands_topic = topic.into();
        self
    }

    pub fn with_updates_topic(mut self, topic: impl Into<String>) -> Self {
        self.updates_topic = topic.into();
        self
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = Some(attempts);
        self
    }

    pub fn with_consumer_group(mut self, group: impl Into<String>) -> Self {
        self.consumer_group = group.into();
        self
    }

    /// Retry topic for commands that failed on infrastructure errors.
    pub fn failed_topic(&self) -> String {
        format!("{}_db_failed", self.commands_topic)
    }

    /// Final stop for commands that exhausted `max_retry_attempts`.
    pub fn dead_letter_topic(&self) -> String {
        format!("{}_dead_letter", self.commands_topic)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::default().with_delay(self.retry_delay());
        match self.max_retry_attempts {
            Some(attempts) => policy.with_max_attempts(attempts),
            None => policy,
        }
    }

    /// Every topic the bus needs, created at startup.
    pub fn topic_specs(&self) -> Vec<TopicSpec> {
        [
            self.commands_topic.clone(),
            self.failed_topic(),
            self.dead_letter_topic(),
            self.updates_topic.clone(),
        ]
        .into_iter()
        .map(|name| TopicSpec::new(name, self.partitions))
        .collect()
    }
}

fn parse<T: FromStr>(name: String, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidVar { name, value })
}
