//! OTAM Firmware: Main Entry Point
//!
//! Hexagonal architecture around a polling update loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspHttpClient   NvsAdapter    OtaFlash      Esp32System       │
//! │  (HttpClient)    (Storage)     (FlashDriver) (SystemPort)      │
//! │  LogEventSink    WiFi STA                                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                Client (pure logic)                     │    │
//! │  │  DeviceAdapter · FlashUpdater · EventRegistry          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;

use otam::adapters::device_id;
use otam::adapters::flash::{OtaFlash, mark_running_valid};
use otam::adapters::http::EspHttpClient;
use otam::adapters::log_sink::LogEventSink;
use otam::adapters::nvs::NvsAdapter;
use otam::adapters::system::{Esp32System, restart};
use otam::adapters::wifi::{WifiCredentials, connect_station};
use otam::app::adapter::DeviceAdapter;
use otam::app::client::Client;
use otam::app::events::{ClientEvent, ClientEventKind};
use otam::app::model::Availability;
use otam::app::updater::FlashUpdater;
use otam::config::{OtamConfig, UpdateLimits};
use otam::events::listener;

/// Delay between availability polls.
const POLL_INTERVAL: Duration = Duration::from_secs(300);
/// Delay before retrying a failed `init`.
const INIT_RETRY: Duration = Duration::from_secs(30);
/// HTTP request timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ── Build-time configuration ──────────────────────────────────

fn build_config() -> Result<OtamConfig> {
    let api_key = option_env!("OTAM_API_KEY").ok_or_else(|| anyhow!("OTAM_API_KEY not set at build time"))?;
    let base_url = option_env!("OTAM_URL").ok_or_else(|| anyhow!("OTAM_URL not set at build time"))?;
    let device_profile_id = option_env!("OTAM_DEVICE_PROFILE_ID")
        .ok_or_else(|| anyhow!("OTAM_DEVICE_PROFILE_ID not set at build time"))?
        .parse::<i32>()
        .context("OTAM_DEVICE_PROFILE_ID is not an integer")?;
    let device_id = match option_env!("OTAM_DEVICE_ID") {
        Some(id) => id.to_owned(),
        None => device_id::device_id(&device_id::read_mac()).as_str().to_owned(),
    };

    let config = OtamConfig {
        api_key: api_key.to_owned(),
        base_url: base_url.trim_end_matches('/').to_owned(),
        device_id,
        device_profile_id,
    };
    config.validate().map_err(|e| anyhow!("invalid OTAM configuration: {e}"))?;
    Ok(config)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  OTAM client v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. OTA rollback check ────────────────────────────────
    mark_running_valid();

    // ── 2. Configuration ──────────────────────────────────────
    let config = build_config()?;
    let limits = UpdateLimits::default();
    info!(
        "Device '{}' (profile {}) → {}",
        config.device_id, config.device_profile_id, config.base_url
    );

    // ── 3. Network ────────────────────────────────────────────
    let creds = WifiCredentials::new(
        option_env!("OTAM_WIFI_SSID").unwrap_or_default(),
        option_env!("OTAM_WIFI_PASS").unwrap_or_default(),
    )
    .map_err(|e| anyhow!("WiFi credentials: {e}"))?;
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let _wifi = connect_station(peripherals.modem, sysloop, &creds).map_err(|e| anyhow!("{e}"))?;

    // ── 4. Adapters ───────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {e}"))?;
    let adapter = DeviceAdapter::new(
        config,
        limits.clone(),
        EspHttpClient::new(HTTP_TIMEOUT),
        nvs.clone(),
        Esp32System::new(),
    );
    let updater = FlashUpdater::new(limits, OtaFlash::new(), nvs);

    // ── 5. Client + event wiring ──────────────────────────────
    let mut client = Client::new(adapter, updater);

    let log_sink = LogEventSink::new();
    if let Err(e) = log_sink.attach(client.events()) {
        warn!("Event log unavailable: {e}");
    }

    let reboot_requested = Rc::new(Cell::new(false));
    let flag = Rc::clone(&reboot_requested);
    let on_reboot = listener(move |_: &ClientEvent| flag.set(true));
    client
        .subscribe(ClientEventKind::InitReboot, &on_reboot)
        .map_err(|e| anyhow!("reboot listener: {e}"))?;

    // ── 6. Identity bootstrap ─────────────────────────────────
    while let Err(e) = client.init() {
        error!("OTAM init failed (code {}): {e}; retrying", e.code());
        std::thread::sleep(INIT_RETRY);
    }

    info!("System ready. Entering update loop.");

    // ── 7. Update loop ────────────────────────────────────────
    loop {
        match client.check_firmware_available() {
            Ok(Availability::Available) => {
                match client.download_firmware() {
                    Ok(size) => info!("Firmware downloaded ({size} bytes)"),
                    Err(e) => {
                        warn!("Download failed (code {}): {e}", e.code());
                        std::thread::sleep(POLL_INTERVAL);
                        continue;
                    }
                }
                if let Err(e) = client.update_firmware() {
                    warn!("Update failed (code {}): {e}", e.code());
                }
                client.adapter_mut().clear_available_firmware();
            }
            Ok(Availability::NoneAvailable) => info!("No update available"),
            Err(e) => warn!("Availability check failed (code {}): {e}", e.code()),
        }

        if reboot_requested.get() {
            restart();
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}
