//! Events published by the update components.
//!
//! The [`DeviceAdapter`](super::adapter::DeviceAdapter) and
//! [`FlashUpdater`](super::updater::FlashUpdater) each own a registry for
//! their own events. The [`Client`](super::client::Client) re-publishes both
//! streams as [`ClientEvent`], so hosts subscribe in one place.

use crate::events::{Event, EventKind, EventRegistry};

// ── Adapter ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    /// Percentage of the firmware image received, `0..=100`.
    DownloadProgress(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEventKind {
    DownloadProgress,
}

impl EventKind for AdapterEventKind {
    const COUNT: usize = 1;

    fn index(self) -> usize {
        self as usize
    }
}

impl Event for AdapterEvent {
    type Kind = AdapterEventKind;

    fn kind(&self) -> AdapterEventKind {
        match self {
            Self::DownloadProgress(_) => AdapterEventKind::DownloadProgress,
        }
    }
}

pub type AdapterEvents = EventRegistry<AdapterEvent, 1>;

// ── Updater ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterEvent {
    /// Percentage of the image written to flash, `0..=100`.
    FlashProgress(u8),
    /// All bytes written (`true`) or the write was aborted (`false`).
    /// Published before finalization, so `true` does not mean verified.
    FlashComplete(bool),
    /// A flash from the previous boot completed.
    UpdateComplete(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterEventKind {
    FlashProgress,
    FlashComplete,
    UpdateComplete,
}

impl EventKind for UpdaterEventKind {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        self as usize
    }
}

impl Event for UpdaterEvent {
    type Kind = UpdaterEventKind;

    fn kind(&self) -> UpdaterEventKind {
        match self {
            Self::FlashProgress(_) => UpdaterEventKind::FlashProgress,
            Self::FlashComplete(_) => UpdaterEventKind::FlashComplete,
            Self::UpdateComplete(_) => UpdaterEventKind::UpdateComplete,
        }
    }
}

pub type UpdaterEvents = EventRegistry<UpdaterEvent, 3>;

// ── Client ────────────────────────────────────────────────────

/// The single subscription surface exposed to host applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    DownloadProgress(u8),
    FlashProgress(u8),
    FlashComplete(bool),
    UpdateComplete(bool),
    /// The new image is in place; the host should quiesce and restart.
    InitReboot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEventKind {
    DownloadProgress,
    FlashProgress,
    FlashComplete,
    UpdateComplete,
    InitReboot,
}

impl ClientEventKind {
    pub const ALL: [Self; 5] = [
        Self::DownloadProgress,
        Self::FlashProgress,
        Self::FlashComplete,
        Self::UpdateComplete,
        Self::InitReboot,
    ];
}

impl EventKind for ClientEventKind {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }
}

impl Event for ClientEvent {
    type Kind = ClientEventKind;

    fn kind(&self) -> ClientEventKind {
        match self {
            Self::DownloadProgress(_) => ClientEventKind::DownloadProgress,
            Self::FlashProgress(_) => ClientEventKind::FlashProgress,
            Self::FlashComplete(_) => ClientEventKind::FlashComplete,
            Self::UpdateComplete(_) => ClientEventKind::UpdateComplete,
            Self::InitReboot => ClientEventKind::InitReboot,
        }
    }
}

pub type ClientEvents = EventRegistry<ClientEvent, 5>;

impl From<AdapterEvent> for ClientEvent {
    fn from(ev: AdapterEvent) -> Self {
        match ev {
            AdapterEvent::DownloadProgress(p) => Self::DownloadProgress(p),
        }
    }
}

impl From<UpdaterEvent> for ClientEvent {
    fn from(ev: UpdaterEvent) -> Self {
        match ev {
            UpdaterEvent::FlashProgress(p) => Self::FlashProgress(p),
            UpdaterEvent::FlashComplete(ok) => Self::FlashComplete(ok),
            UpdaterEvent::UpdateComplete(ok) => Self::UpdateComplete(ok),
        }
    }
}
