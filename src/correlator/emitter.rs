use std::sync::Mutex;

use event_emitter_rs::EventEmitter;
use log::warn;

use super::{Correlator, CorrelatorError, Signal, SignalChannel, SignalHandler};

/// Correlator backed by an [`EventEmitter`].
///
/// Signals travel through the emitter as JSON strings and every listener runs
/// on its own emitter thread, so delivery is asynchronous and unordered
/// relative to other signals.
pub struct EmitterCorrelator {
    emitter: Mutex<EventEmitter>,
}

impl Default for EmitterCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitterCorrelator {
    pub fn new() -> Self {
        Self::from_emitter(EventEmitter::new())
    }

    pub fn from_emitter(emitter: EventEmitter) -> Self {
        Self {
            emitter: Mutex::new(emitter),
        }
    }
}

impl Correlator for EmitterCorrelator {
    fn publish(&self, channel: SignalChannel, signal: &Signal) -> Result<(), CorrelatorError> {
        let payload = serde_json::to_string(signal)?;
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| CorrelatorError::LockPoisoned("publish"))?;
        let _ = emitter.emit(channel.as_str(), payload);
        Ok(())
    }

    fn subscribe(
        &self,
        channel: SignalChannel,
        handler: SignalHandler,
    ) -> Result<(), CorrelatorError> {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| CorrelatorError::LockPoisoned("subscribe"))?;
        emitter.on(channel.as_str(), move |payload: String| {
            match serde_json::from_str::<Signal>(&payload) {
                Ok(signal) => handler(signal),
                Err(e) => warn!("dropping malformed {} signal: {}", channel.as_str(), e),
            }
        });
        Ok(())
    }
}
