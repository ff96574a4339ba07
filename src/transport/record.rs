//! Records and metadata exchanged with the partitioned log.

/// A topic to create, with its partition count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: u32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: u32) -> Self {
        Self {
            name: name.into(),
            partitions,
        }
    }
}

/// A record to append to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Partition routing key.
    pub key: String,
    /// Serialized payload (JSON envelope).
    pub value: Vec<u8>,
    /// Producer timestamp, epoch millis as a string.
    pub timestamp: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: Vec<u8>, timestamp: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp: timestamp.into(),
        }
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

/// Where an appended record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// A record handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub value: Vec<u8>,
    pub timestamp: String,
}

/// Per-partition log metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub id: u32,
    /// Offset the next appended record will get.
    pub high_watermark: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: Vec<PartitionMetadata>,
}

impl TopicMetadata {
    /// Total number of records across partitions.
    pub fn record_count(&self) -> u64 {
        self.partitions.iter().map(|p| p.high_watermark).sum()
    }
}
