//! Client facade: one lifecycle and one event surface over the adapter and
//! the updater.
//!
//! ```text
//!   init() ─▶ check_firmware_available() ─▶ download_firmware() ─▶ update_firmware()
//!     │                                          │                      │
//!     ▼                                          ▼                      ▼
//!   UpdateComplete                         DownloadProgress      FlashProgress,
//!                                                                FlashComplete,
//!                                                                InitReboot
//! ```
//!
//! The client is an ordinary owned value. Component events are forwarded by
//! closures holding an `Rc` of the client's registry, so several clients can
//! coexist (one per test, for instance).

use std::rc::Rc;

use log::{info, warn};

use crate::app::adapter::DeviceAdapter;
use crate::app::events::{
    AdapterEvent, AdapterEventKind, ClientEvent, ClientEventKind, ClientEvents, UpdaterEvent,
    UpdaterEventKind,
};
use crate::app::model::Availability;
use crate::app::ports::{FlashDriver, HttpClient, StoragePort, SystemPort};
use crate::app::updater::FlashUpdater;
use crate::error::{ClientError, FlashError};
use crate::events::{Listener, RegistryFull, listener};

pub struct Client<H, S, M, F> {
    adapter: DeviceAdapter<H, S, M>,
    updater: FlashUpdater<F, S>,
    events: Rc<ClientEvents>,
}

impl<H, S, M, F> Client<H, S, M, F>
where
    H: HttpClient,
    S: StoragePort,
    M: SystemPort,
    F: FlashDriver,
{
    /// Compose the two components and start forwarding their events.
    pub fn new(adapter: DeviceAdapter<H, S, M>, updater: FlashUpdater<F, S>) -> Self {
        let events = Rc::new(ClientEvents::new());

        let sink = Rc::clone(&events);
        let from_adapter: Listener<AdapterEvent> =
            listener(move |ev: &AdapterEvent| sink.publish(&ClientEvent::from(*ev)));
        if let Err(e) = adapter
            .events()
            .subscribe(AdapterEventKind::DownloadProgress, &from_adapter)
        {
            warn!("Client: cannot forward adapter events: {e}");
        }

        let sink = Rc::clone(&events);
        let from_updater: Listener<UpdaterEvent> =
            listener(move |ev: &UpdaterEvent| sink.publish(&ClientEvent::from(*ev)));
        for kind in [
            UpdaterEventKind::FlashProgress,
            UpdaterEventKind::FlashComplete,
            UpdaterEventKind::UpdateComplete,
        ] {
            if let Err(e) = updater.events().subscribe(kind, &from_updater) {
                warn!("Client: cannot forward updater {kind:?} events: {e}");
            }
        }

        Self {
            adapter,
            updater,
            events,
        }
    }

    /// Resume post-flash bookkeeping, then bootstrap device identity.
    pub fn init(&mut self) -> Result<(), ClientError> {
        self.updater.init()?;
        self.adapter.init()?;
        info!("Client: initialised");
        Ok(())
    }

    pub fn check_firmware_available(&mut self) -> Result<Availability, ClientError> {
        self.ensure_ready()?;
        Ok(self.adapter.update_available()?)
    }

    /// Download the available image. Returns its size in bytes.
    pub fn download_firmware(&mut self) -> Result<usize, ClientError> {
        self.ensure_ready()?;
        Ok(self.adapter.download_available_firmware()?)
    }

    /// Flash the downloaded image.
    ///
    /// On success [`ClientEvent::InitReboot`] is published; the host should
    /// quiesce and restart. On failure the reason is reported to the service.
    pub fn update_firmware(&mut self) -> Result<(), ClientError> {
        self.ensure_ready()?;

        let image = match self.adapter.firmware_image() {
            Some(image) if !image.is_empty() => image,
            _ => return Err(ClientError::NoFirmwareDownloaded),
        };

        if let Err(e) = self.updater.validate_and_perform_update(image) {
            let message = match e {
                FlashError::InsufficientSpace(driver) | FlashError::FinalizeFailed(driver) => {
                    driver.description().to_owned()
                }
                FlashError::WriteFailed | FlashError::NotFinished => self
                    .updater
                    .last_driver_error()
                    .map_or_else(|| e.to_string(), |driver| driver.description().to_owned()),
                // Rejected before the driver was involved.
                FlashError::InvalidSize => e.to_string(),
            };
            warn!("Client: update failed: {message}");
            if let Err(report) = self.adapter.log_error(&message) {
                warn!("Client: failure report not delivered: {report}");
            }
            return Err(ClientError::UpdateFailed(e));
        }

        if let Err(report) = self.adapter.report_update_success() {
            warn!("Client: success report not delivered: {report}");
        }
        info!("Client: update applied, restart required");
        self.events.publish(&ClientEvent::InitReboot);
        Ok(())
    }

    fn ensure_ready(&self) -> Result<(), ClientError> {
        if self.adapter.is_ready() {
            Ok(())
        } else {
            Err(ClientError::NotReady)
        }
    }

    // ── Events ────────────────────────────────────────────────

    pub fn subscribe(
        &self,
        kind: ClientEventKind,
        listener: &Listener<ClientEvent>,
    ) -> Result<(), RegistryFull> {
        self.events.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, kind: ClientEventKind, listener: &Listener<ClientEvent>) -> bool {
        self.events.unsubscribe(kind, listener)
    }

    pub fn events(&self) -> &ClientEvents {
        &self.events
    }

    // ── Components ────────────────────────────────────────────

    pub fn adapter(&self) -> &DeviceAdapter<H, S, M> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut DeviceAdapter<H, S, M> {
        &mut self.adapter
    }

    pub fn updater(&self) -> &FlashUpdater<F, S> {
        &self.updater
    }
}
