//! Transport: access to a partitioned log.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TransportService                          │
//! │  - create_topics() / send() / send_many() / metadata        │
//! │  - envelope → JSON record, key assignment, lazy connect     │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Broker + Consumer Traits                     │
//! │  Broker: connect / create_topic / produce / metadata        │
//! │  Consumer: poll(timeout) / commit(partition, offset)        │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌──────────────┐    ┌─────────────┐    ┌─────────────────────┐
//! │InMemoryBroker│    │    Kafka    │    │      Redpanda       │
//! │  (included)  │    │ (external)  │    │     (external)      │
//! └──────────────┘    └─────────────┘    └─────────────────────┘
//! ```

mod broker;
mod error;
mod in_memory;
mod key;
mod record;
mod service;

pub use broker::{partition_for, Broker, Consumer};
pub use error::TransportError;
pub use in_memory::{InMemoryBroker, InMemoryConsumer};
pub use key::{new_key, KEY_LENGTH};
pub use record::{
    ConsumedRecord, PartitionMetadata, Record, RecordMetadata, TopicMetadata, TopicSpec,
};
pub use service::TransportService;
