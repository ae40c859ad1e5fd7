//! OTA flash driver adapter.
//!
//! Implements [`FlashDriver`] with `esp-ota` on target: the image goes to the
//! next OTA partition and becomes the boot partition on `end()`. The host
//! simulation stages the image in memory against a fixed partition size.

use log::{info, warn};

use crate::app::ports::{FlashDriver, FlashDriverError};

/// Size of one OTA slot in the default two-slot partition table.
#[cfg(not(target_os = "espidf"))]
pub const SIM_PARTITION_SIZE: usize = 0x1E_0000;

pub struct OtaFlash {
    expected: usize,
    written: usize,
    finished: bool,
    last_error: Option<FlashDriverError>,

    #[cfg(target_os = "espidf")]
    update: Option<esp_ota::OtaUpdate>,

    #[cfg(not(target_os = "espidf"))]
    staged: Option<Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    committed: Option<Vec<u8>>,
}

impl OtaFlash {
    pub fn new() -> Self {
        Self {
            expected: 0,
            written: 0,
            finished: false,
            last_error: None,
            #[cfg(target_os = "espidf")]
            update: None,
            #[cfg(not(target_os = "espidf"))]
            staged: None,
            #[cfg(not(target_os = "espidf"))]
            committed: None,
        }
    }

    fn fail(&mut self, err: FlashDriverError) -> FlashDriverError {
        self.last_error = Some(err);
        err
    }

    /// Bytes available in the slot the next image would be written to.
    #[cfg(target_os = "espidf")]
    fn target_capacity() -> Option<usize> {
        // SAFETY: a null argument asks for the slot after the running one;
        // the returned pointer refers to the static partition table.
        let part = unsafe { esp_idf_svc::sys::esp_ota_get_next_update_partition(core::ptr::null()) };
        if part.is_null() {
            return None;
        }
        Some(unsafe { (*part).size } as usize)
    }

    #[cfg(not(target_os = "espidf"))]
    fn target_capacity() -> Option<usize> {
        Some(SIM_PARTITION_SIZE)
    }

    /// Image made bootable by the last successful `end()` (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn committed_image(&self) -> Option<&[u8]> {
        self.committed.as_deref()
    }
}

impl Default for OtaFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashDriver for OtaFlash {
    fn begin(&mut self, size: usize) -> Result<(), FlashDriverError> {
        self.abort();
        self.last_error = None;
        self.finished = false;

        if size == 0 {
            return Err(self.fail(FlashDriverError::Size));
        }
        let Some(capacity) = Self::target_capacity() else {
            return Err(self.fail(FlashDriverError::NoPartition));
        };
        if size > capacity {
            warn!("Flash: image of {size} bytes exceeds slot of {capacity} bytes");
            return Err(self.fail(FlashDriverError::Space));
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                self.fail(FlashDriverError::Erase)
            })?;
            self.update = Some(update);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.staged = Some(Vec::with_capacity(size));
        }

        self.expected = size;
        self.written = 0;
        info!("Flash: begin ({size} bytes)");
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> usize {
        if self.written + data.len() > self.expected {
            self.fail(FlashDriverError::Size);
            return 0;
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.as_mut() else {
                self.fail(FlashDriverError::BadArgument);
                return 0;
            };
            if let Err(e) = update.write(data) {
                warn!("esp-ota write failed: {:?}", e);
                self.fail(FlashDriverError::Write);
                return 0;
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let Some(staged) = self.staged.as_mut() else {
                self.fail(FlashDriverError::BadArgument);
                return 0;
            };
            staged.extend_from_slice(data);
        }

        self.written += data.len();
        data.len()
    }

    fn end(&mut self) -> Result<(), FlashDriverError> {
        if self.written != self.expected {
            self.abort();
            return Err(self.fail(FlashDriverError::Size));
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.update.take() else {
                return Err(self.fail(FlashDriverError::BadArgument));
            };
            let mut completed = update.finalize().map_err(|e| {
                warn!("esp-ota finalize failed: {:?}", e);
                self.fail(FlashDriverError::MagicByte)
            })?;
            completed.set_as_boot_partition().map_err(|e| {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                self.fail(FlashDriverError::Activate)
            })?;
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let Some(image) = self.staged.take() else {
                return Err(self.fail(FlashDriverError::BadArgument));
            };
            self.committed = Some(image);
        }

        self.finished = true;
        info!("Flash: image finalized and set as boot partition");
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn abort(&mut self) {
        #[cfg(target_os = "espidf")]
        let open = self.update.take().is_some();
        #[cfg(not(target_os = "espidf"))]
        let open = self.staged.take().is_some();

        // esp-ota aborts automatically when OtaUpdate is dropped.
        if open {
            if self.last_error.is_none() {
                self.last_error = Some(FlashDriverError::Aborted);
            }
            warn!("Flash: transaction aborted at {}/{} bytes", self.written, self.expected);
        }
    }

    fn last_error(&self) -> Option<FlashDriverError> {
        self.last_error
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image as good so the bootloader does not roll back.
///
/// Call once the firmware has come up far enough to fetch updates again.
#[cfg(target_os = "espidf")]
pub fn mark_running_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("Flash: running image marked valid (rollback cancelled)"),
        Err(e) => warn!("Flash: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mark_running_valid() {
    info!("Flash: rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
