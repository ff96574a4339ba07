//! Startup helpers.

use log::info;

use crate::config::BusConfig;
use crate::transport::{TransportError, TransportService};

/// Create every bus topic with the configured partition count.
///
/// Safe to call from every process on every start: topics that already
/// exist are left alone.
pub fn ensure_topics(transport: &TransportService, config: &BusConfig) -> Result<(), TransportError> {
    let topics = config.topic_specs();
    transport.create_topics(&topics)?;
    info!(
        "bus topics ready: {}",
        topics
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
