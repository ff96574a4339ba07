//! Worker threads for the primary and failed-retry pipelines.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use super::stream::{CommandExecutor, Outcome, TopicRole};
use crate::store::UnitOfWorkFactory;
use crate::transport::Consumer;

/// Statistics from one worker thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub committed: usize,
    pub rejected: usize,
    pub dropped: usize,
    pub skipped: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
    /// Poll, process or offset-commit failures.
    pub errors: usize,
    /// Number of poll cycles completed.
    pub polls: usize,
}

impl WorkerStats {
    fn record(&mut self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Committed => &mut self.committed,
            Outcome::Rejected => &mut self.rejected,
            Outcome::Dropped => &mut self.dropped,
            Outcome::Skipped => &mut self.skipped,
            Outcome::Requeued => &mut self.requeued,
            Outcome::DeadLettered => &mut self.dead_lettered,
        };
        *counter += 1;
    }

    /// Records whose offset was committed.
    pub fn processed(&self) -> usize {
        self.committed
            + self.rejected
            + self.dropped
            + self.skipped
            + self.requeued
            + self.dead_lettered
    }
}

/// Statistics from both pipelines.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutorStats {
    pub primary: WorkerStats,
    pub retry: WorkerStats,
}

struct Worker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl Worker {
    fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }

    fn join(&mut self) -> WorkerStats {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => WorkerStats::default(),
        }
    }
}

/// Handle to the executor's worker threads. Drop or call `stop()` to shut down.
pub struct ExecutorHandle {
    primary: Worker,
    retry: Worker,
}

impl ExecutorHandle {
    /// Stop both workers and wait for them to finish. Returns stats.
    pub fn stop(mut self) -> ExecutorStats {
        self.signal_stop();
        ExecutorStats {
            primary: self.primary.join(),
            retry: self.retry.join(),
        }
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&self) {
        self.primary.signal_stop();
        self.retry.signal_stop();
    }
}

impl Drop for ExecutorHandle {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

impl<F: UnitOfWorkFactory + 'static> CommandExecutor<F> {
    /// Start consuming the primary and failed-retry topics.
    ///
    /// Each topic gets its own thread; records within a partition are
    /// processed one at a time and committed one at a time.
    pub fn spawn<P, R>(self: Arc<Self>, primary: P, retry: R, poll_interval: Duration) -> ExecutorHandle
    where
        P: Consumer + 'static,
        R: Consumer + 'static,
    {
        ExecutorHandle {
            primary: start(Arc::clone(&self), primary, TopicRole::Primary, poll_interval),
            retry: start(self, retry, TopicRole::Retry, poll_interval),
        }
    }
}

fn start<F, C>(
    executor: Arc<CommandExecutor<F>>,
    consumer: C,
    role: TopicRole,
    poll_interval: Duration,
) -> Worker
where
    F: UnitOfWorkFactory + 'static,
    C: Consumer + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel();
    let handle = thread::spawn(move || run(&executor, &consumer, role, poll_interval, stop_rx));
    Worker {
        stop_tx,
        handle: Some(handle),
    }
}

fn run<F, C>(
    executor: &CommandExecutor<F>,
    consumer: &C,
    role: TopicRole,
    poll_interval: Duration,
    stop_rx: Receiver<()>,
) -> WorkerStats
where
    F: UnitOfWorkFactory,
    C: Consumer,
{
    info!("{:?} worker started on {}", role, consumer.topic());
    let mut stats = WorkerStats::default();

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        stats.polls += 1;

        match consumer.poll(poll_interval.as_millis() as u64) {
            Ok(Some(record)) => match executor.process(&record, role) {
                Ok(outcome) => {
                    stats.record(outcome);
                    if let Err(e) = consumer.commit(record.partition, record.offset) {
                        error!(
                            "failed to commit {}/{}@{}: {}",
                            record.topic, record.partition, record.offset, e
                        );
                        stats.errors += 1;
                    }
                }
                Err(e) => {
                    // Not durable anywhere yet: read it again
                    error!(
                        "failed to settle {}/{}@{}: {}",
                        record.topic, record.partition, record.offset, e
                    );
                    stats.errors += 1;
                    if let Err(e) = consumer.seek(record.partition, record.offset) {
                        error!("failed to rewind {}: {}", record.topic, e);
                    }
                    thread::sleep(poll_interval);
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!("poll on {} failed: {}", consumer.topic(), e);
                stats.errors += 1;
                thread::sleep(poll_interval);
            }
        }
    }

    info!(
        "{:?} worker on {} stopped after {} records",
        role,
        consumer.topic(),
        stats.processed()
    );
    stats
}
