//! In-memory partitioned log for testing and single-process scenarios.
//!
//! `InMemoryBroker` keeps every topic as a set of append-only partitions and
//! stores consumer-group offsets the way a real broker does, which makes it
//! useful for:
//! - Unit and integration testing without external dependencies
//! - Exercising at-least-once redelivery (`InMemoryConsumer::rewind`)
//! - Exercising broker outages (`InMemoryBroker::set_available`)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::info;

use super::broker::{partition_for, Broker, Consumer};
use super::error::TransportError;
use super::record::{
    ConsumedRecord, PartitionMetadata, Record, RecordMetadata, TopicMetadata, TopicSpec,
};

type Partitions = Vec<Vec<Record>>;

/// In-memory partitioned log.
///
/// Cheap to clone; clones share the same topics and offsets.
///
/// ## Example
///
/// ```
/// use schoolbus::transport::{Broker, Consumer, InMemoryBroker, Record, TopicSpec};
///
/// let broker = InMemoryBroker::new();
/// broker.create_topic(&TopicSpec::new("commands", 3)).unwrap();
/// broker
///     .produce("commands", vec![Record::new("k1", b"{}".to_vec(), "0")])
///     .unwrap();
///
/// let consumer = broker.consumer("executor", "commands");
/// let record = consumer.poll(100).unwrap().unwrap();
/// consumer.commit(record.partition, record.offset).unwrap();
/// assert_eq!(consumer.committed(record.partition).unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    topics: Arc<RwLock<HashMap<String, Partitions>>>,
    /// Committed offsets keyed by (group, topic, partition)
    offsets: Arc<DashMap<(String, String, u32), u64>>,
    available: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            offsets: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a consumer-group member for `topic`.
    pub fn consumer(&self, group: &str, topic: &str) -> InMemoryConsumer {
        InMemoryConsumer {
            broker: self.clone(),
            group: group.to_string(),
            topic: topic.to_string(),
            positions: Mutex::new(HashMap::new()),
            next_partition: Mutex::new(0),
        }
    }

    /// Simulate an outage: while unavailable every call fails with
    /// `ConnectionFailed`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// All records of a topic, partition by partition.
    pub fn records(&self, topic: &str) -> Result<Vec<ConsumedRecord>, TransportError> {
        let topics = self
            .topics
            .read()
            .map_err(|_| TransportError::LockPoisoned("records"))?;
        let partitions = topics
            .get(topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;

        Ok(partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, log)| {
                log.iter().enumerate().map(move |(offset, record)| ConsumedRecord {
                    topic: topic.to_string(),
                    partition: partition as u32,
                    offset: offset as u64,
                    key: record.key.clone(),
                    value: record.value.clone(),
                    timestamp: record.timestamp.clone(),
                })
            })
            .collect())
    }

    /// Total number of records in a topic (0 if it does not exist).
    pub fn len(&self, topic: &str) -> usize {
        self.topics
            .read()
            .map(|topics| {
                topics
                    .get(topic)
                    .map(|partitions| partitions.iter().map(Vec::len).sum())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    fn ensure_available(&self) -> Result<(), TransportError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::ConnectionFailed(
                "broker unavailable".to_string(),
            ))
        }
    }

    fn committed_offset(&self, group: &str, topic: &str, partition: u32) -> u64 {
        self.offsets
            .get(&(group.to_string(), topic.to_string(), partition))
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }
}

impl Broker for InMemoryBroker {
    fn connect(&self) -> Result<(), TransportError> {
        self.ensure_available()?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_topic(&self, spec: &TopicSpec) -> Result<(), TransportError> {
        self.ensure_available()?;
        let mut topics = self
            .topics
            .write()
            .map_err(|_| TransportError::LockPoisoned("create_topic"))?;
        if topics.contains_key(&spec.name) {
            return Err(TransportError::TopicAlreadyExists(spec.name.clone()));
        }
        let count = spec.partitions.max(1) as usize;
        topics.insert(spec.name.clone(), vec![Vec::new(); count]);
        info!("created topic {} with {} partitions", spec.name, count);
        Ok(())
    }

    fn produce(
        &self,
        topic: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordMetadata>, TransportError> {
        self.ensure_available()?;
        let mut topics = self
            .topics
            .write()
            .map_err(|_| TransportError::LockPoisoned("produce"))?;
        let partitions = topics
            .get_mut(topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;

        let count = partitions.len() as u32;
        let mut written = Vec::with_capacity(records.len());
        for record in records {
            let partition = partition_for(&record.key, count);
            let log = &mut partitions[partition as usize];
            written.push(RecordMetadata {
                topic: topic.to_string(),
                partition,
                offset: log.len() as u64,
            });
            log.push(record);
        }
        Ok(written)
    }

    fn metadata(&self, topic: &str) -> Result<TopicMetadata, TransportError> {
        self.ensure_available()?;
        let topics = self
            .topics
            .read()
            .map_err(|_| TransportError::LockPoisoned("metadata"))?;
        let partitions = topics
            .get(topic)
            .ok_or_else(|| TransportError::TopicNotFound(topic.to_string()))?;

        Ok(TopicMetadata {
            name: topic.to_string(),
            partitions: partitions
                .iter()
                .enumerate()
                .map(|(id, log)| PartitionMetadata {
                    id: id as u32,
                    high_watermark: log.len() as u64,
                })
                .collect(),
        })
    }
}

/// A consumer-group member over an [`InMemoryBroker`] topic.
///
/// Each consumer tracks its own fetch position per partition, starting from
/// the group's committed offset. Partitions are served round-robin; within a
/// partition records arrive in append order.
pub struct InMemoryConsumer {
    broker: InMemoryBroker,
    group: String,
    topic: String,
    /// Next offset to fetch, per partition
    positions: Mutex<HashMap<u32, u64>>,
    next_partition: Mutex<u32>,
}

impl InMemoryConsumer {
    /// Forget fetch positions so the next poll resumes at the committed
    /// offsets, as a restarted process would.
    pub fn rewind(&self) -> Result<(), TransportError> {
        self.positions
            .lock()
            .map_err(|_| TransportError::LockPoisoned("rewind"))?
            .clear();
        Ok(())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn fetch(&self) -> Result<Option<ConsumedRecord>, TransportError> {
        let topics = self
            .broker
            .topics
            .read()
            .map_err(|_| TransportError::LockPoisoned("poll"))?;
        // Consumers may start before the topic is created
        let Some(partitions) = topics.get(&self.topic) else {
            return Ok(None);
        };

        let mut positions = self
            .positions
            .lock()
            .map_err(|_| TransportError::LockPoisoned("poll"))?;
        let mut next = self
            .next_partition
            .lock()
            .map_err(|_| TransportError::LockPoisoned("poll"))?;

        let count = partitions.len() as u32;
        for step in 0..count {
            let partition = (*next + step) % count;
            let position = positions.entry(partition).or_insert_with(|| {
                self.broker
                    .committed_offset(&self.group, &self.topic, partition)
            });

            if let Some(record) = partitions[partition as usize].get(*position as usize) {
                let consumed = ConsumedRecord {
                    topic: self.topic.clone(),
                    partition,
                    offset: *position,
                    key: record.key.clone(),
                    value: record.value.clone(),
                    timestamp: record.timestamp.clone(),
                };
                *position += 1;
                *next = (partition + 1) % count;
                return Ok(Some(consumed));
            }
        }
        Ok(None)
    }
}

impl Consumer for InMemoryConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn poll(&self, timeout_ms: u64) -> Result<Option<ConsumedRecord>, TransportError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            self.broker.ensure_available()?;

            if let Some(record) = self.fetch()? {
                return Ok(Some(record));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn commit(&self, partition: u32, offset: u64) -> Result<(), TransportError> {
        self.broker.ensure_available()?;
        let mut entry = self
            .broker
            .offsets
            .entry((self.group.clone(), self.topic.clone(), partition))
            .or_insert(0);
        // Commits never move backwards
        *entry = (*entry).max(offset + 1);
        Ok(())
    }

    fn committed(&self, partition: u32) -> Result<u64, TransportError> {
        Ok(self
            .broker
            .committed_offset(&self.group, &self.topic, partition))
    }

    fn seek(&self, partition: u32, offset: u64) -> Result<(), TransportError> {
        self.positions
            .lock()
            .map_err(|_| TransportError::LockPoisoned("seek"))?
            .insert(partition, offset);
        Ok(())
    }
}
