//! executor: the consuming side of the command bus.
//!
//! ## Flow
//!
//! ```text
//!  commands ──poll──▶ decode ──▶ route ──▶ bundle.invoke ──▶ commit ──▶ resolve
//!                                   │              │
//!                                   │              ├─ terminal error ──▶ reject
//!                                   │              └─ infrastructure ──▶ {commands}_db_failed
//!                                   └─ unknown ──▶ reject (keyed) / drop (keyless)
//!
//!  {commands}_db_failed ──poll──▶ same pipeline, delayed re-forward on failure,
//!                                 {commands}_dead_letter once retries are exhausted
//! ```
//!
//! Offsets are committed per record, after its outcome is durable.

mod stream;
mod thread;

pub use stream::{CommandExecutor, Outcome, RetryPolicy, TopicRole};
pub use thread::{ExecutorHandle, ExecutorStats, WorkerStats};
