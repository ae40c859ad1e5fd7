//! Error types for the OTAM update pipeline.
//!
//! One small `Copy` enum per fallible operation, so every failure mode of a
//! call is distinguishable and no error object is shared between phases.
//! Each enum maps to a stable signed code via `code()`; the codes are part of
//! the client's public contract and never reused within one call.

use core::fmt;

use crate::app::ports::FlashDriverError;

// ---------------------------------------------------------------------------
// Identity bootstrap (Adapter::init)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    /// The persistent store namespace could not be opened.
    StoreOpen,
    /// The `init-device` request failed or returned no GUID.
    Registration,
    /// Persisting `device_guid` failed.
    WriteGuid,
    /// Persisting `device_id` failed.
    WriteDeviceId,
    /// Persisting `device_profile_id` failed.
    WriteProfileId,
}

impl IdentityError {
    pub const fn code(self) -> i8 {
        match self {
            Self::StoreOpen => -1,
            Self::Registration => -2,
            Self::WriteGuid => -3,
            Self::WriteDeviceId => -4,
            Self::WriteProfileId => -5,
        }
    }
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreOpen => write!(f, "failed to open persistent store"),
            Self::Registration => write!(f, "device registration failed"),
            Self::WriteGuid => write!(f, "failed to persist device guid"),
            Self::WriteDeviceId => write!(f, "failed to persist device id"),
            Self::WriteProfileId => write!(f, "failed to persist device profile id"),
        }
    }
}

// ---------------------------------------------------------------------------
// Availability poll (Adapter::update_available)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollError {
    /// Status request failed (non-200 or empty body).
    Transport,
    /// `deviceStatus` present but a required firmware field is missing.
    Parse,
}

impl PollError {
    pub const fn code(self) -> i8 {
        match self {
            Self::Transport => -1,
            Self::Parse => -2,
        }
    }
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "device status request failed"),
            Self::Parse => write!(f, "failed to parse firmware details"),
        }
    }
}

// ---------------------------------------------------------------------------
// Firmware download (Adapter::download_available_firmware)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadError {
    /// No positive availability poll precedes this download.
    NoFirmwareAvailable,
    /// The server answered the download request with a non-200 status.
    HttpStatus(u16),
    /// The declared content length is zero or missing.
    InvalidContentLength,
    /// The stream ended or failed before the declared length arrived.
    Interrupted,
    /// Declared length exceeds free heap minus the safety margin.
    InsufficientMemory,
    /// The download buffer could not be reserved.
    AllocationFailed,
    /// The `firmware-file-url` lookup failed.
    UrlFetch,
}

impl DownloadError {
    pub const fn code(self) -> i8 {
        match self {
            Self::NoFirmwareAvailable => -1,
            Self::HttpStatus(_) => -2,
            Self::InvalidContentLength => -3,
            Self::Interrupted => -4,
            Self::InsufficientMemory => -5,
            Self::AllocationFailed => -6,
            Self::UrlFetch => -7,
        }
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFirmwareAvailable => write!(f, "no firmware available to download"),
            Self::HttpStatus(status) => write!(f, "firmware download returned HTTP {status}"),
            Self::InvalidContentLength => write!(f, "invalid content length"),
            Self::Interrupted => write!(f, "download interrupted"),
            Self::InsufficientMemory => write!(f, "not enough free heap for firmware image"),
            Self::AllocationFailed => write!(f, "firmware buffer allocation failed"),
            Self::UrlFetch => write!(f, "failed to fetch firmware download URL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote reporting (Adapter::log_error / log_message)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    /// No firmware descriptor to attach the status report to.
    NoUpdateContext,
    /// The POST failed.
    Transport,
}

impl ReportError {
    pub const fn code(self) -> i8 {
        match self {
            Self::NoUpdateContext => -1,
            Self::Transport => -2,
        }
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUpdateContext => write!(f, "no firmware update to report against"),
            Self::Transport => write!(f, "report request failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Updater bookkeeping (Updater::init)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterInitError {
    StoreOpen,
    /// Clearing the `fw_update_complete` flag failed.
    StoreWrite,
}

impl UpdaterInitError {
    pub const fn code(self) -> i8 {
        match self {
            Self::StoreOpen => -1,
            Self::StoreWrite => -2,
        }
    }
}

impl fmt::Display for UpdaterInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreOpen => write!(f, "failed to open persistent store"),
            Self::StoreWrite => write!(f, "failed to clear update-complete flag"),
        }
    }
}

// ---------------------------------------------------------------------------
// Flash write (Updater::validate_and_perform_update)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Image size outside the accepted bounds; no transaction was started.
    InvalidSize,
    /// The driver refused to begin (not enough space in the target slot).
    InsufficientSpace(FlashDriverError),
    /// A chunk was written short; the transaction was aborted.
    WriteFailed,
    /// The driver failed to finalize the image.
    FinalizeFailed(FlashDriverError),
    /// The driver finalized but does not report the update as finished.
    NotFinished,
}

impl FlashError {
    pub const fn code(self) -> i8 {
        match self {
            Self::InvalidSize => -2,
            Self::InsufficientSpace(_) => -3,
            Self::WriteFailed => -4,
            Self::FinalizeFailed(_) => -5,
            Self::NotFinished => -6,
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize => write!(f, "firmware size out of range"),
            Self::InsufficientSpace(e) => write!(f, "cannot begin flash: {e}"),
            Self::WriteFailed => write!(f, "short write to flash"),
            Self::FinalizeFailed(e) => write!(f, "flash finalization failed: {e}"),
            Self::NotFinished => write!(f, "flash update not finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client facade
// ---------------------------------------------------------------------------

/// Errors surfaced by [`Client`](crate::app::client::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// The adapter has not completed `init`.
    NotReady,
    /// `update_firmware` called without a downloaded image.
    NoFirmwareDownloaded,
    /// The updater rejected or failed to write the image.
    UpdateFailed(FlashError),
    AdapterInit(IdentityError),
    UpdaterInit(UpdaterInitError),
    Poll(PollError),
    Download(DownloadError),
}

impl ClientError {
    /// Code of the failing client call.
    ///
    /// `init` reports −1 for adapter failures and −2 for updater failures;
    /// `check_firmware_available` and `download_firmware` forward the
    /// component code after their own −1 readiness check.
    pub const fn code(self) -> i8 {
        match self {
            Self::NotReady | Self::AdapterInit(_) => -1,
            Self::NoFirmwareDownloaded | Self::UpdaterInit(_) => -2,
            Self::UpdateFailed(_) => -3,
            Self::Poll(e) => e.code(),
            Self::Download(e) => e.code(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "adapter not ready"),
            Self::NoFirmwareDownloaded => write!(f, "no firmware downloaded"),
            Self::UpdateFailed(e) => write!(f, "update failed: {e}"),
            Self::AdapterInit(e) => write!(f, "adapter init: {e}"),
            Self::UpdaterInit(e) => write!(f, "updater init: {e}"),
            Self::Poll(e) => write!(f, "availability check: {e}"),
            Self::Download(e) => write!(f, "download: {e}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<IdentityError> for ClientError {
    fn from(e: IdentityError) -> Self {
        Self::AdapterInit(e)
    }
}

impl From<UpdaterInitError> for ClientError {
    fn from(e: UpdaterInitError) -> Self {
        Self::UpdaterInit(e)
    }
}

impl From<PollError> for ClientError {
    fn from(e: PollError) -> Self {
        Self::Poll(e)
    }
}

impl From<DownloadError> for ClientError {
    fn from(e: DownloadError) -> Self {
        Self::Download(e)
    }
}

impl From<FlashError> for ClientError {
    fn from(e: FlashError) -> Self {
        Self::UpdateFailed(e)
    }
}
