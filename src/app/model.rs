//! Domain records: who the device is and what the server offers it.

use crate::config::OtamConfig;
use crate::json;

/// Longest GUID / device id the store will hold.
pub const IDENTITY_FIELD_CAP: usize = 64;

pub type Guid = heapless::String<IDENTITY_FIELD_CAP>;
pub type DeviceIdString = heapless::String<IDENTITY_FIELD_CAP>;

/// Device identity as persisted in the store.
///
/// `guid` stays empty until the service has issued one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub guid: Guid,
    pub device_id: DeviceIdString,
    /// `None` when nothing has been persisted yet.
    pub device_profile_id: Option<i32>,
}

impl DeviceIdentity {
    pub fn is_registered(&self) -> bool {
        !self.guid.is_empty()
    }

    /// Registration is needed when no GUID exists or the configured identity
    /// differs from the persisted one.
    pub fn needs_registration(&self, config: &OtamConfig) -> bool {
        !self.is_registered()
            || self.device_id.as_str() != config.device_id
            || self.device_profile_id != Some(config.device_profile_id)
    }
}

/// Firmware offered by the service on a positive availability poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareDescriptor {
    pub file_id: u32,
    pub id: u32,
    pub name: String,
    pub version: String,
    pub size: u32,
}

impl FirmwareDescriptor {
    /// Extract the five firmware fields from a device-status body.
    ///
    /// `None` if any of them is missing or has the wrong scalar type.
    pub fn from_status(body: &str) -> Option<Self> {
        Some(Self {
            file_id: json::extract_int(body, "firmwareFileId")?,
            id: json::extract_int(body, "firmwareId")?,
            name: json::extract_string(body, "firmwareName")?.to_owned(),
            version: json::extract_string(body, "firmwareVersion")?.to_owned(),
            size: json::extract_int(body, "firmwareSize")?,
        })
    }
}

/// Positive outcome of an availability poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// A firmware descriptor was populated.
    Available,
    /// The server reported nothing to install.
    NoneAvailable,
}

impl Availability {
    pub const fn code(self) -> i8 {
        match self {
            Self::Available => 0,
            Self::NoneAvailable => 1,
        }
    }

    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}
