use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Correlator, CorrelatorError, Signal, SignalChannel, SignalHandler};

/// Synchronous in-process correlator.
///
/// Handlers run on the publishing thread, in subscription order. Useful when
/// producer and executor share a process and for deterministic tests.
#[derive(Clone, Default)]
pub struct LocalCorrelator {
    listeners: Arc<RwLock<HashMap<SignalChannel, Vec<SignalHandler>>>>,
}

impl LocalCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers subscribed to `channel`.
    pub fn listener_count(&self, channel: SignalChannel) -> usize {
        self.listeners
            .read()
            .map(|listeners| listeners.get(&channel).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Correlator for LocalCorrelator {
    fn publish(&self, channel: SignalChannel, signal: &Signal) -> Result<(), CorrelatorError> {
        let listeners = self
            .listeners
            .read()
            .map_err(|_| CorrelatorError::LockPoisoned("publish"))?;
        if let Some(handlers) = listeners.get(&channel) {
            for handler in handlers {
                handler(signal.clone());
            }
        }
        Ok(())
    }

    fn subscribe(
        &self,
        channel: SignalChannel,
        handler: SignalHandler,
    ) -> Result<(), CorrelatorError> {
        self.listeners
            .write()
            .map_err(|_| CorrelatorError::LockPoisoned("subscribe"))?
            .entry(channel)
            .or_default()
            .push(handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Datum;
    use std::sync::Mutex;

    #[test]
    fn delivers_only_to_matching_channel() {
        let correlator = LocalCorrelator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        correlator
            .subscribe(
                SignalChannel::Resolve,
                Box::new(move |signal| sink.lock().unwrap().push(signal.event_key)),
            )
            .unwrap();

        correlator
            .publish(SignalChannel::Resolve, &Signal::resolved("k1", Datum::Null))
            .unwrap();
        correlator
            .publish(
                SignalChannel::Reject,
                &Signal {
                    event_key: "k2".into(),
                    result: None,
                    error: None,
                },
            )
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["k1".to_string()]);
        assert_eq!(correlator.listener_count(SignalChannel::Resolve), 1);
        assert_eq!(correlator.listener_count(SignalChannel::Reject), 0);
    }
}
