pub mod bootstrap;
pub mod config;
pub mod correlator;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod producer;
pub mod service;
pub mod store;
pub mod transport;

pub use bootstrap::ensure_topics;
pub use config::{BusConfig, ConfigError};
#[cfg(feature = "emitter")]
pub use correlator::EmitterCorrelator;
pub use correlator::{Correlator, CorrelatorError, LocalCorrelator, Signal, SignalChannel};
pub use envelope::{Datum, Envelope, Route, ENVELOPE_VERSION};
pub use error::{CommandError, Disposition, ErrorKind, RemoteError};
pub use executor::{
    CommandExecutor, ExecutorHandle, ExecutorStats, Outcome, RetryPolicy, TopicRole, WorkerStats,
};
pub use notifier::{UpdateEvent, UpdateNotifier};
pub use producer::{CommandFailure, CommandProducer, CommandReply};
pub use service::{
    get_factory, HandlerBundle, RegistryError, ServiceContext, ServiceFactory, ServiceRegistry,
};
pub use store::{
    InMemoryStore, InMemoryUnitOfWork, Repository, StoreError, TransactionMode, UnitOfWork,
    UnitOfWorkFactory,
};
pub use transport::{
    Broker, Consumer, InMemoryBroker, InMemoryConsumer, TopicSpec, TransportError,
    TransportService,
};

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
