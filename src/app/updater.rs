//! Flash updater: size validation and chunked write of a downloaded image.
//!
//! ```text
//!   Idle ──begin()──▶ Writing ──all chunks──▶ Finalizing ──end()──▶ Done
//!                        │                        │
//!                        └── short write ──▶ Failed ◀── end() / not finished
//! ```
//!
//! The running image is never touched: the [`FlashDriver`] writes to the
//! inactive slot and only `end()` switches the boot target.

use log::{info, warn};

use crate::app::events::{UpdaterEvent, UpdaterEvents};
use crate::app::ports::{FlashDriver, FlashDriverError, StorageExt, StoragePort};
use crate::config::{STORE_NAMESPACE, UpdateLimits};
use crate::error::{FlashError, UpdaterInitError};
use crate::stream::ChunkedTransfer;

/// Set after a successful flash, consumed by [`FlashUpdater::init`] on the
/// next boot.
const KEY_UPDATE_COMPLETE: &str = "fw_update_complete";

pub struct FlashUpdater<F, S> {
    limits: UpdateLimits,
    flash: F,
    store: S,
    events: UpdaterEvents,
}

impl<F, S> FlashUpdater<F, S>
where
    F: FlashDriver,
    S: StoragePort,
{
    pub fn new(limits: UpdateLimits, flash: F, store: S) -> Self {
        Self {
            limits,
            flash,
            store,
            events: UpdaterEvents::new(),
        }
    }

    /// Surface a flash completed before the last restart.
    ///
    /// If the completion flag is set it is cleared and
    /// [`UpdaterEvent::UpdateComplete`]`(true)` is published.
    pub fn init(&mut self) -> Result<(), UpdaterInitError> {
        self.store.open(STORE_NAMESPACE).map_err(|e| {
            warn!("Updater: store open failed: {e}");
            UpdaterInitError::StoreOpen
        })?;

        let complete = self
            .store
            .read_bool(STORE_NAMESPACE, KEY_UPDATE_COMPLETE)
            .unwrap_or_else(|e| {
                warn!("Updater: unreadable {KEY_UPDATE_COMPLETE}: {e}");
                None
            })
            .unwrap_or(false);

        if complete {
            self.store
                .write_bool(STORE_NAMESPACE, KEY_UPDATE_COMPLETE, false)
                .map_err(|e| {
                    warn!("Updater: clearing {KEY_UPDATE_COMPLETE} failed: {e}");
                    UpdaterInitError::StoreWrite
                })?;
            info!("Updater: previous update completed");
            self.events.publish(&UpdaterEvent::UpdateComplete(true));
        }
        Ok(())
    }

    /// Write `image` to the inactive slot and make it the boot target.
    ///
    /// [`UpdaterEvent::FlashComplete`]`(true)` is published once every byte
    /// is written, before finalization; a later `FinalizeFailed` or
    /// `NotFinished` can still follow it.
    pub fn validate_and_perform_update(&mut self, image: &[u8]) -> Result<(), FlashError> {
        let size = image.len();
        if size < self.limits.min_image_size || size > self.limits.max_image_size {
            warn!(
                "Updater: rejecting image of {size} bytes (accepted {}..={})",
                self.limits.min_image_size, self.limits.max_image_size
            );
            return Err(FlashError::InvalidSize);
        }

        self.flash.begin(size).map_err(|e| {
            warn!("Updater: cannot begin update of {size} bytes: {e}");
            FlashError::InsufficientSpace(e)
        })?;

        info!("Updater: flashing {size} bytes");
        let mut transfer = ChunkedTransfer::new(size, self.limits.flash_chunk);
        while let Some(window) = transfer.next_window() {
            let chunk = &image[window];
            let written = self.flash.write(chunk);
            if written != chunk.len() {
                warn!(
                    "Updater: short write at {}/{size} ({written} of {} bytes)",
                    transfer.offset(),
                    chunk.len()
                );
                self.flash.abort();
                self.events.publish(&UpdaterEvent::FlashComplete(false));
                return Err(FlashError::WriteFailed);
            }
            if let Some(pct) = transfer.commit(written) {
                self.events.publish(&UpdaterEvent::FlashProgress(pct));
            }
        }

        self.events.publish(&UpdaterEvent::FlashComplete(true));

        self.flash.end().map_err(|e| {
            warn!("Updater: finalize failed: {e}");
            FlashError::FinalizeFailed(e)
        })?;

        if !self.flash.is_finished() {
            warn!("Updater: driver reports update not finished");
            return Err(FlashError::NotFinished);
        }

        if let Err(e) = self.store.write_bool(STORE_NAMESPACE, KEY_UPDATE_COMPLETE, true) {
            warn!("Updater: could not record completion: {e}");
        }
        info!("Updater: image written and marked bootable");
        Ok(())
    }

    /// Description of the last driver failure.
    pub fn error_string(&self) -> &'static str {
        self.last_driver_error().map_or("No Error", FlashDriverError::description)
    }

    pub fn last_driver_error(&self) -> Option<FlashDriverError> {
        self.flash.last_error()
    }

    pub fn events(&self) -> &UpdaterEvents {
        &self.events
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
