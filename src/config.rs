//! Client configuration parameters
//!
//! [`OtamConfig`] identifies the device to the OTAM service and is immutable
//! for the lifetime of the [`DeviceAdapter`](crate::app::adapter::DeviceAdapter).
//! [`UpdateLimits`] carries the tunable constants of the download and flash
//! pipelines.

use serde::{Deserialize, Serialize};

/// Device identity and service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtamConfig {
    /// API key sent with every request.
    pub api_key: String,
    /// Base URL of the OTAM API, without a trailing slash.
    pub base_url: String,
    /// Caller-chosen device identifier.
    pub device_id: String,
    /// Device profile the firmware stream is selected from.
    pub device_profile_id: i32,
}

impl OtamConfig {
    /// Reject configurations the service can never accept.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.api_key.is_empty() {
            return Err("api_key must not be empty");
        }
        if !self.base_url.starts_with("http") {
            return Err("base_url must be an http(s) URL");
        }
        if self.base_url.ends_with('/') {
            return Err("base_url must not end with '/'");
        }
        if self.device_id.is_empty() {
            return Err("device_id must not be empty");
        }
        Ok(())
    }
}

/// Tunables for the download and flash pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLimits {
    // --- Download ---
    /// Heap kept free for the network stack and other subsystems (bytes).
    pub heap_safety_margin: usize,
    /// Bytes requested per stream read.
    pub download_chunk: usize,

    // --- Flash ---
    /// Bytes handed to the flash driver per write.
    pub flash_chunk: usize,
    /// Smallest image accepted for flashing (bytes).
    pub min_image_size: usize,
    /// Largest image accepted for flashing (bytes).
    pub max_image_size: usize,
}

impl Default for UpdateLimits {
    fn default() -> Self {
        Self {
            // Download
            heap_safety_margin: 64 * 1024,
            download_chunk: 1024,

            // Flash
            flash_chunk: 1024,
            min_image_size: 64 * 1024,
            max_image_size: 2 * 1024 * 1024,
        }
    }
}

/// Persistent store namespace for identity and update bookkeeping.
pub const STORE_NAMESPACE: &str = "otam-store";

/// HTTP header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";
