//! Transport service: envelope-level access to the partitioned log.

use std::sync::{Arc, Mutex};

use log::{debug, info};

use super::broker::Broker;
use super::error::TransportError;
use super::key::new_key;
use super::record::{Record, RecordMetadata, TopicMetadata, TopicSpec};
use crate::envelope::Envelope;

/// Thin wrapper over a [`Broker`] that speaks envelopes.
///
/// - serializes envelopes to JSON and stringifies their timestamp,
/// - routes each record by the envelope's key, or a fresh key if it has none,
/// - connects lazily on first use.
///
/// Broker errors propagate unchanged; retrying is the executor's job.
#[derive(Clone)]
pub struct TransportService {
    broker: Arc<dyn Broker>,
    connected: Arc<Mutex<bool>>,
}

impl TransportService {
    pub fn new<B: Broker + 'static>(broker: B) -> Self {
        Self::from_arc(Arc::new(broker))
    }

    pub fn from_arc(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            connected: Arc::new(Mutex::new(false)),
        }
    }

    /// Generate a fresh correlation/partition key.
    pub fn new_key() -> String {
        new_key()
    }

    /// Make sure every topic exists. Topics that already exist are fine.
    pub fn create_topics(&self, topics: &[TopicSpec]) -> Result<(), TransportError> {
        self.ensure_connected()?;
        for spec in topics {
            match self.broker.create_topic(spec) {
                Ok(()) => info!("topic {} ready ({} partitions)", spec.name, spec.partitions),
                Err(TransportError::TopicAlreadyExists(name)) => {
                    debug!("topic {} already exists", name)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Send one envelope.
    pub fn send(&self, topic: &str, envelope: &Envelope) -> Result<RecordMetadata, TransportError> {
        self.ensure_connected()?;
        let record = to_record(envelope)?;
        debug!("sending {} to {} (key {})", envelope.event, topic, record.key);
        let mut written = self.broker.produce(topic, vec![record])?;
        written
            .pop()
            .ok_or_else(|| TransportError::ConnectionFailed("broker acknowledged no record".into()))
    }

    /// Send several envelopes as one batch.
    pub fn send_many(
        &self,
        topic: &str,
        envelopes: &[Envelope],
    ) -> Result<Vec<RecordMetadata>, TransportError> {
        if envelopes.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_connected()?;
        let records = envelopes
            .iter()
            .map(to_record)
            .collect::<Result<Vec<_>, _>>()?;
        debug!("sending batch of {} to {}", records.len(), topic);
        self.broker.produce(topic, records)
    }

    pub fn topic_metadata(&self, topic: &str) -> Result<TopicMetadata, TransportError> {
        self.ensure_connected()?;
        self.broker.metadata(topic)
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        let mut connected = self
            .connected
            .lock()
            .map_err(|_| TransportError::LockPoisoned("connect"))?;
        if !*connected {
            self.broker.connect()?;
            *connected = true;
            info!("transport connected");
        }
        Ok(())
    }
}

fn to_record(envelope: &Envelope) -> Result<Record, TransportError> {
    let key = envelope
        .correlation_key()
        .map(str::to_string)
        .unwrap_or_else(new_key);
    Ok(Record::new(
        key,
        envelope.encode()?,
        envelope.timestamp.to_string(),
    ))
}
