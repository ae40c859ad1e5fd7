//! Log-based event sink adapter.
//!
//! Subscribes to every [`ClientEvent`] kind and writes the events to the
//! ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::{ClientEvent, ClientEventKind};
use crate::events::{EventRegistry, Listener, RegistryFull, listener};

/// Adapter that logs every [`ClientEvent`] to the serial console.
pub struct LogEventSink {
    handle: Listener<ClientEvent>,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self {
            handle: listener(log_event),
        }
    }

    /// Register for every client event kind.
    pub fn attach<const K: usize, const N: usize>(
        &self,
        events: &EventRegistry<ClientEvent, K, N>,
    ) -> Result<(), RegistryFull> {
        ClientEventKind::ALL
            .iter()
            .try_for_each(|kind| events.subscribe(*kind, &self.handle))
    }

    pub fn detach<const K: usize, const N: usize>(&self, events: &EventRegistry<ClientEvent, K, N>) {
        for kind in ClientEventKind::ALL {
            events.unsubscribe(kind, &self.handle);
        }
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::DownloadProgress(pct) => info!("OTA   | download {pct:>3}%"),
        ClientEvent::FlashProgress(pct) => info!("OTA   | flash    {pct:>3}%"),
        ClientEvent::FlashComplete(true) => info!("OTA   | flash write complete"),
        ClientEvent::FlashComplete(false) => warn!("OTA   | flash write aborted"),
        ClientEvent::UpdateComplete(ok) => info!("OTA   | previous update complete={ok}"),
        ClientEvent::InitReboot => info!("OTA   | new image ready, restart pending"),
    }
}
