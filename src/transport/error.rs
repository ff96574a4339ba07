use thiserror::Error;

/// Errors raised by the partitioned log.
///
/// There is no retry at this layer; callers see broker errors as-is.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("topic '{0}' already exists")]
    TopicAlreadyExists(String),

    #[error("partition {partition} does not exist in topic '{topic}'")]
    PartitionNotFound { topic: String, partition: u32 },

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("broker lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::SerializationFailed(err.to_string())
    }
}
