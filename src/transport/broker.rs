//! Core traits for the partitioned log.

use super::error::TransportError;
use super::record::{ConsumedRecord, Record, RecordMetadata, TopicMetadata, TopicSpec};

/// Administrative and producer-side access to a partitioned log.
///
/// Implementations might include:
/// - `InMemoryBroker` - For testing and single-process scenarios
/// - a Kafka client
/// - a Redpanda client
pub trait Broker: Send + Sync {
    /// Establish the underlying connection. Called once, lazily.
    fn connect(&self) -> Result<(), TransportError>;

    /// Create a topic. Fails with `TopicAlreadyExists` if it is already there.
    fn create_topic(&self, spec: &TopicSpec) -> Result<(), TransportError>;

    /// Append records to a topic as one batch. Each record is routed to a
    /// partition by its key.
    fn produce(&self, topic: &str, records: Vec<Record>)
        -> Result<Vec<RecordMetadata>, TransportError>;

    /// Describe a topic's partitions.
    fn metadata(&self, topic: &str) -> Result<TopicMetadata, TransportError>;
}

/// Consumer-group member reading one topic.
///
/// This is a pull-based interface. Offsets are committed per message: a
/// consumer that restarts resumes after the last committed offset of each
/// partition, so anything polled but not committed is delivered again.
pub trait Consumer: Send + Sync {
    /// Topic this consumer reads.
    fn topic(&self) -> &str;

    /// Poll for the next record, blocking until one is available or timeout.
    fn poll(&self, timeout_ms: u64) -> Result<Option<ConsumedRecord>, TransportError>;

    /// Commit `offset` as processed; the group resumes at `offset + 1`.
    fn commit(&self, partition: u32, offset: u64) -> Result<(), TransportError>;

    /// Next offset the group will read from `partition`.
    fn committed(&self, partition: u32) -> Result<u64, TransportError>;

    /// Move this member's fetch position so `offset` is polled again.
    fn seek(&self, partition: u32, offset: u64) -> Result<(), TransportError>;
}

/// Pick a partition for `key`.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    if partitions == 0 {
        return 0;
    }
    crc32fast::hash(key.as_bytes()) % partitions
}
