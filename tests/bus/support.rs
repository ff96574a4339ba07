//! A whole bus in one process: broker, store, correlator, a caller-side
//! producer, and an executor running on worker threads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use schoolbus::{
    ensure_topics, get_factory, BusConfig, CommandExecutor, CommandProducer, Correlator,
    Envelope, ExecutorHandle, ExecutorStats, InMemoryBroker, InMemoryStore, LocalCorrelator,
    TransportService, UpdateNotifier,
};

use crate::handlers;

pub struct TestBus {
    pub config: BusConfig,
    pub broker: InMemoryBroker,
    pub store: InMemoryStore,
    pub transport: TransportService,
    pub correlator: Arc<dyn Correlator>,
    /// The caller's producer. The executor owns a separate one.
    pub producer: Arc<CommandProducer>,
    executor: Option<ExecutorHandle>,
}

/// Single partition, short timings.
pub fn config() -> BusConfig {
    BusConfig::default()
        .with_partitions(1)
        .with_command_timeout(Duration::from_secs(3))
        .with_poll_interval(Duration::from_millis(5))
        .with_retry_delay(Duration::from_millis(20))
}

impl TestBus {
    /// Topics and a caller-side producer, no executor.
    pub fn idle(config: BusConfig) -> Self {
        Self::idle_with(config, Arc::new(LocalCorrelator::new()))
    }

    pub fn idle_with(config: BusConfig, correlator: Arc<dyn Correlator>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let broker = InMemoryBroker::new();
        let transport = TransportService::new(broker.clone());
        ensure_topics(&transport, &config).unwrap();

        let producer = CommandProducer::new(
            transport.clone(),
            Arc::clone(&correlator),
            config.commands_topic.clone(),
            config.command_timeout(),
        )
        .unwrap();

        Self {
            config,
            broker,
            store: InMemoryStore::new(),
            transport,
            correlator,
            producer: Arc::new(producer),
            executor: None,
        }
    }

    pub fn start(config: BusConfig) -> Self {
        Self::idle(config).with_executor()
    }

    pub fn start_with(config: BusConfig, correlator: Arc<dyn Correlator>) -> Self {
        Self::idle_with(config, correlator).with_executor()
    }

    fn with_executor(mut self) -> Self {
        let executor_producer = CommandProducer::new(
            self.transport.clone(),
            Arc::clone(&self.correlator),
            self.config.commands_topic.clone(),
            self.config.command_timeout(),
        )
        .unwrap();
        let notifier = UpdateNotifier::new(self.transport.clone(), self.config.updates_topic.clone());
        let factory = get_factory(
            self.store.clone(),
            handlers::registry(),
            Arc::new(executor_producer),
            self.transport.clone(),
            Arc::new(notifier),
        )
        .unwrap();

        let executor = Arc::new(CommandExecutor::from_config(factory, &self.config));
        let group = &self.config.consumer_group;
        self.executor = Some(executor.spawn(
            self.broker.consumer(group, &self.config.commands_topic),
            self.broker.consumer(group, &self.config.failed_topic()),
            self.config.poll_interval(),
        ));
        self
    }

    /// Stop the executor and return its stats.
    pub fn stop(mut self) -> ExecutorStats {
        self.executor
            .take()
            .map(ExecutorHandle::stop)
            .unwrap_or_default()
    }

    /// Envelopes currently on `topic`, in partition order.
    pub fn envelopes(&self, topic: &str) -> Vec<Envelope> {
        self.broker
            .records(topic)
            .unwrap()
            .iter()
            .filter_map(|record| Envelope::decode(&record.value))
            .collect()
    }

    /// Events named `name` on the updates topic.
    pub fn updates(&self, name: &str) -> Vec<Envelope> {
        self.envelopes(&self.config.updates_topic)
            .into_iter()
            .filter(|envelope| envelope.event == name)
            .collect()
    }
}

/// Poll `condition` for up to two seconds.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
