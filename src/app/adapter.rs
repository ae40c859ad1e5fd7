//! Device adapter: identity, availability polling and image download.
//!
//! ```text
//!   Uninitialized ──init()──▶ Ready ──update_available()──▶ Checked-Available
//!                                 │                        └▶ Checked-None
//!                                 │
//!   Checked-Available ──download_available_firmware()──▶ Downloaded
//!   Downloaded / Checked-* ──clear_available_firmware()──▶ Cleared
//! ```
//!
//! The adapter owns the downloaded image and lends it by reference to the
//! updater. All I/O goes through the injected ports; nothing here blocks
//! except inside the port calls themselves.

use log::{debug, info, warn};

use crate::app::events::{AdapterEvent, AdapterEvents};
use crate::app::model::{Availability, DeviceIdString, DeviceIdentity, FirmwareDescriptor, Guid};
use crate::app::ports::{ByteSource, HttpClient, Method, StorageExt, StoragePort, SystemPort};
use crate::config::{API_KEY_HEADER, OtamConfig, STORE_NAMESPACE, UpdateLimits};
use crate::error::{DownloadError, IdentityError, PollError, ReportError};
use crate::json;
use crate::stream::ChunkedTransfer;

// Persisted keys.
const KEY_GUID: &str = "device_guid";
const KEY_DEVICE_ID: &str = "device_id";
const KEY_PROFILE_ID: &str = "device_profile_id";

/// Owns device identity and all update-discovery traffic.
pub struct DeviceAdapter<H, S, M> {
    config: OtamConfig,
    limits: UpdateLimits,
    http: H,
    store: S,
    system: M,

    identity: DeviceIdentity,
    ready: bool,
    firmware: Option<FirmwareDescriptor>,
    download_url: Option<String>,
    image: Option<Vec<u8>>,

    events: AdapterEvents,
}

impl<H, S, M> DeviceAdapter<H, S, M>
where
    H: HttpClient,
    S: StoragePort,
    M: SystemPort,
{
    pub fn new(config: OtamConfig, limits: UpdateLimits, http: H, store: S, system: M) -> Self {
        Self {
            config,
            limits,
            http,
            store,
            system,
            identity: DeviceIdentity::default(),
            ready: false,
            firmware: None,
            download_url: None,
            image: None,
            events: AdapterEvents::new(),
        }
    }

    // ── Identity ──────────────────────────────────────────────

    /// Load the persisted identity and register with the service when it is
    /// missing or no longer matches the configuration.
    pub fn init(&mut self) -> Result<(), IdentityError> {
        self.ready = false;

        self.store.open(STORE_NAMESPACE).map_err(|e| {
            warn!("Adapter: store open failed: {e}");
            IdentityError::StoreOpen
        })?;

        self.identity = self.load_identity();

        if self.identity.needs_registration(&self.config) {
            info!(
                "Adapter: registering device '{}' (profile {})",
                self.config.device_id, self.config.device_profile_id
            );
            let guid = self.register()?;
            self.persist_identity(&guid)?;
        } else {
            debug!("Adapter: identity unchanged, guid={}", self.identity.guid);
        }

        self.ready = true;
        info!("Adapter: ready, guid={}", self.identity.guid);
        Ok(())
    }

    fn load_identity(&self) -> DeviceIdentity {
        let store = &self.store;
        let guid = store.read_str(STORE_NAMESPACE, KEY_GUID).unwrap_or_else(|e| {
            warn!("Adapter: unreadable {KEY_GUID}: {e}");
            None
        });
        let device_id = store.read_str(STORE_NAMESPACE, KEY_DEVICE_ID).unwrap_or_else(|e| {
            warn!("Adapter: unreadable {KEY_DEVICE_ID}: {e}");
            None
        });
        let device_profile_id = store.read_i32(STORE_NAMESPACE, KEY_PROFILE_ID).unwrap_or_else(|e| {
            warn!("Adapter: unreadable {KEY_PROFILE_ID}: {e}");
            None
        });

        DeviceIdentity {
            guid: guid.unwrap_or_default(),
            device_id: device_id.unwrap_or_default(),
            device_profile_id,
        }
    }

    /// POST the current identity to `init-device`; the body of the reply is
    /// the new GUID.
    fn register(&mut self) -> Result<Guid, IdentityError> {
        let payload = [
            json::build_object("deviceId", self.config.device_id.as_str()),
            json::build_object("deviceGuid", self.identity.guid.as_str()),
            json::build_object("deviceProfileId", self.config.device_profile_id),
        ]
        .iter()
        .fold(String::from("{}"), |acc, obj| json::merge_objects(&acc, obj));

        let url = format!("{}/init-device", self.config.base_url);
        let body = self.request(Method::Post, &url, Some(payload.as_str())).ok_or(IdentityError::Registration)?;

        let mut guid = Guid::new();
        guid.push_str(body.trim()).map_err(|_| {
            warn!("Adapter: registration returned an oversized guid ({} bytes)", body.len());
            IdentityError::Registration
        })?;
        Ok(guid)
    }

    fn persist_identity(&mut self, guid: &Guid) -> Result<(), IdentityError> {
        let mut device_id = DeviceIdString::new();
        device_id.push_str(&self.config.device_id).map_err(|_| {
            warn!("Adapter: device id '{}' is too long to persist", self.config.device_id);
            IdentityError::WriteDeviceId
        })?;

        self.store.write_str(STORE_NAMESPACE, KEY_GUID, guid).map_err(|e| {
            warn!("Adapter: writing {KEY_GUID} failed: {e}");
            IdentityError::WriteGuid
        })?;
        self.identity.guid = guid.clone();

        self.store
            .write_str(STORE_NAMESPACE, KEY_DEVICE_ID, &self.config.device_id)
            .map_err(|e| {
                warn!("Adapter: writing {KEY_DEVICE_ID} failed: {e}");
                IdentityError::WriteDeviceId
            })?;
        self.identity.device_id = device_id;

        self.store
            .write_i32(STORE_NAMESPACE, KEY_PROFILE_ID, self.config.device_profile_id)
            .map_err(|e| {
                warn!("Adapter: writing {KEY_PROFILE_ID} failed: {e}");
                IdentityError::WriteProfileId
            })?;
        self.identity.device_profile_id = Some(self.config.device_profile_id);

        Ok(())
    }

    // ── Availability ──────────────────────────────────────────

    /// Ask the service whether firmware is pending for this device.
    ///
    /// Any earlier descriptor, cached download URL and downloaded image are
    /// dropped first, so a poll never leaves stale firmware behind.
    pub fn update_available(&mut self) -> Result<Availability, PollError> {
        self.firmware = None;
        self.download_url = None;
        self.image = None;

        let url = self.device_url("status");
        let body = self.request(Method::Get, &url, None).ok_or(PollError::Transport)?;

        if json::extract_string(&body, "deviceStatus").is_none() {
            debug!("Adapter: no update pending");
            return Ok(Availability::NoneAvailable);
        }

        let fw = FirmwareDescriptor::from_status(&body).ok_or_else(|| {
            warn!("Adapter: status reports an update but firmware fields are incomplete");
            PollError::Parse
        })?;
        info!(
            "Adapter: firmware available: {} v{} ({} bytes, id={}, file={})",
            fw.name, fw.version, fw.size, fw.id, fw.file_id
        );
        self.firmware = Some(fw);
        Ok(Availability::Available)
    }

    // ── Download ──────────────────────────────────────────────

    /// Stream the available firmware into an owned buffer of exactly the
    /// declared length. Returns the image size.
    ///
    /// Publishes [`AdapterEvent::DownloadProgress`] each time the integer
    /// percentage rises. Any failure leaves no buffer behind.
    pub fn download_available_firmware(&mut self) -> Result<usize, DownloadError> {
        if self.firmware.is_none() {
            return Err(DownloadError::NoFirmwareAvailable);
        }
        self.image = None;

        let url = match &self.download_url {
            Some(url) => url.clone(),
            None => {
                let url = self.fetch_download_url()?;
                self.download_url = Some(url.clone());
                url
            }
        };

        let headers = [(API_KEY_HEADER, self.config.api_key.as_str())];
        let (head, mut body) = self.http.get_stream(&url, &headers).map_err(|e| {
            warn!("Adapter: download request failed: {e}");
            DownloadError::HttpStatus(0)
        })?;

        if head.status != 200 {
            warn!("Adapter: download returned HTTP {}", head.status);
            return Err(DownloadError::HttpStatus(head.status));
        }

        let total = match head.content_length {
            Some(len) if len > 0 => len,
            _ => {
                warn!("Adapter: download has no usable content length");
                return Err(DownloadError::InvalidContentLength);
            }
        };

        let budget = self.system.free_heap().saturating_sub(self.limits.heap_safety_margin);
        if total > budget {
            warn!("Adapter: image of {total} bytes exceeds heap budget of {budget} bytes");
            return Err(DownloadError::InsufficientMemory);
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(total).map_err(|_| {
            warn!("Adapter: could not reserve {total} bytes");
            DownloadError::AllocationFailed
        })?;
        buf.resize(total, 0);

        info!("Adapter: downloading {total} bytes");
        let mut transfer = ChunkedTransfer::new(total, self.limits.download_chunk);
        while let Some(window) = transfer.next_window() {
            match body.read(&mut buf[window]) {
                Ok(n) if n > 0 => {
                    if let Some(pct) = transfer.commit(n) {
                        self.events.publish(&AdapterEvent::DownloadProgress(pct));
                    }
                }
                Ok(_) => {
                    warn!(
                        "Adapter: stream ended at {}/{} bytes",
                        transfer.offset(),
                        transfer.total()
                    );
                    return Err(DownloadError::Interrupted);
                }
                Err(e) => {
                    warn!(
                        "Adapter: read failed at {}/{} bytes: {e}",
                        transfer.offset(),
                        transfer.total()
                    );
                    return Err(DownloadError::Interrupted);
                }
            }
        }
        drop(body);

        info!("Adapter: download complete");
        self.image = Some(buf);
        Ok(total)
    }

    fn fetch_download_url(&mut self) -> Result<String, DownloadError> {
        let url = self.device_url("firmware-file-url");
        let body = self.request(Method::Get, &url, None).ok_or(DownloadError::UrlFetch)?;
        let raw = body.trim();
        if raw.starts_with("http") {
            Ok(raw.to_owned())
        } else {
            Ok(format!("{}/{}", self.config.base_url, raw.trim_start_matches('/')))
        }
    }

    /// Drop the downloaded image and forget the available firmware.
    pub fn clear_available_firmware(&mut self) {
        self.image = None;
        self.firmware = None;
        self.download_url = None;
    }

    // ── Remote reporting ──────────────────────────────────────

    /// Report a failed update against the available firmware.
    pub fn log_error(&mut self, message: &str) -> Result<(), ReportError> {
        let payload = self.status_payload("UPDATE_FAILED")?;
        let payload = json::merge_objects(&payload, &json::build_object("logMessage", message));
        let url = self.device_url("status");
        self.post_report(&url, &payload)
    }

    /// Report a successfully flashed image against the available firmware.
    pub fn report_update_success(&mut self) -> Result<(), ReportError> {
        let payload = self.status_payload("UPDATE_SUCCESS")?;
        let url = self.device_url("status");
        self.post_report(&url, &payload)
    }

    /// Send a free-form line to the device log.
    pub fn log_message(&mut self, message: &str) -> Result<(), ReportError> {
        let payload = json::build_object("message", message);
        let url = self.device_url("log");
        self.post_report(&url, &payload)
    }

    fn status_payload(&self, status: &str) -> Result<String, ReportError> {
        let fw = self.firmware.as_ref().ok_or(ReportError::NoUpdateContext)?;
        Ok([
            json::build_object("deviceStatus", status),
            json::build_object("firmwareFileId", fw.file_id),
            json::build_object("firmwareId", fw.id),
            json::build_object("firmwareVersion", fw.version.as_str()),
        ]
        .iter()
        .fold(String::from("{}"), |acc, obj| json::merge_objects(&acc, obj)))
    }

    fn post_report(&mut self, url: &str, payload: &str) -> Result<(), ReportError> {
        let headers = [
            (API_KEY_HEADER, self.config.api_key.as_str()),
            ("Content-Type", "application/json"),
        ];
        match self.http.request(Method::Post, url, &headers, Some(payload)) {
            Ok(resp) if (200..300).contains(&resp.status) => Ok(()),
            Ok(resp) => {
                warn!("Adapter: report to {url} returned HTTP {}", resp.status);
                Err(ReportError::Transport)
            }
            Err(e) => {
                warn!("Adapter: report to {url} failed: {e}");
                Err(ReportError::Transport)
            }
        }
    }

    // ── HTTP helpers ──────────────────────────────────────────

    fn device_url(&self, endpoint: &str) -> String {
        format!("{}/devices/{}/{endpoint}", self.config.base_url, self.identity.guid)
    }

    /// Request with the API key; `None` unless the reply is 200 with a body.
    fn request(&mut self, method: Method, url: &str, payload: Option<&str>) -> Option<String> {
        let key = self.config.api_key.as_str();
        let json_headers = [(API_KEY_HEADER, key), ("Content-Type", "application/json")];
        let plain_headers = [(API_KEY_HEADER, key)];
        let headers: &[(&str, &str)] = if payload.is_some() { &json_headers } else { &plain_headers };

        let resp = match self.http.request(method, url, headers, payload) {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Adapter: {method:?} {url} failed: {e}");
                return None;
            }
        };
        if !resp.is_ok() {
            warn!("Adapter: {method:?} {url} returned HTTP {}", resp.status);
            return None;
        }
        if resp.body.is_empty() {
            warn!("Adapter: {method:?} {url} returned an empty body");
            return None;
        }
        Some(resp.body)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn guid(&self) -> &str {
        &self.identity.guid
    }

    pub fn device_id(&self) -> &str {
        &self.identity.device_id
    }

    pub fn device_profile_id(&self) -> Option<i32> {
        self.identity.device_profile_id
    }

    pub fn available_firmware(&self) -> Option<&FirmwareDescriptor> {
        self.firmware.as_ref()
    }

    /// The downloaded image, if a download completed since the last clear.
    pub fn firmware_image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn config(&self) -> &OtamConfig {
        &self.config
    }

    pub fn events(&self) -> &AdapterEvents {
        &self.events
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
