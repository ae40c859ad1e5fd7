//! WiFi station-mode bring-up for the firmware binary.
//!
//! The update client itself is transport-agnostic; the firmware only needs
//! an IP link before the first request. Credentials are validated on every
//! target, the connection is made with `esp_idf_svc::wifi` on ESP-IDF.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

/// Station credentials that passed validation.
#[derive(Debug, Clone)]
pub struct WifiCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        creds
            .password
            .push_str(password)
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        Ok(creds)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use station::connect_station;

#[cfg(target_os = "espidf")]
mod station {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use log::{info, warn};

    use super::{ConnectivityError, WifiCredentials};

    /// Join the configured network and wait until the interface has an IP.
    ///
    /// The returned driver must be kept alive for as long as the link is needed.
    pub fn connect_station(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        creds: &WifiCredentials,
    ) -> Result<BlockingWifi<EspWifi<'static>>, ConnectivityError> {
        let fail = |stage: &str, e: esp_idf_svc::sys::EspError| {
            warn!("WiFi: {stage} failed: {e}");
            ConnectivityError::ConnectionFailed
        };

        let esp_wifi = EspWifi::new(modem, sysloop.clone(), None).map_err(|e| fail("driver init", e))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(|e| fail("event wrap", e))?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: creds.ssid.as_str().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
            password: creds
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method: if creds.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }))
        .map_err(|e| fail("configuration", e))?;

        wifi.start().map_err(|e| fail("start", e))?;
        wifi.connect().map_err(|e| fail("connect", e))?;
        wifi.wait_netif_up().map_err(|e| fail("netif up", e))?;

        info!("WiFi: connected to '{}'", creds.ssid);
        Ok(wifi)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
