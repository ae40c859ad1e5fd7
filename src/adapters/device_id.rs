//! Device identifier derived from the ESP32 factory MAC address.
//!
//! Used when the firmware is built without an explicit `OTAM_DEVICE_ID`.
//! The id has the form `OTAM-XXYYZZ` (last 3 bytes of the 6-byte MAC in
//! uppercase hex) and is stable across reboots, so an unconfigured device
//! keeps its OTAM registration.

use core::fmt::Write;

/// "OTAM-XXYYZZ" (11 chars).
pub type MacDeviceId = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_id(mac: &MacAddress) -> MacDeviceId {
    let mut id = MacDeviceId::new();
    let _ = write!(id, "OTAM-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}
