//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                         |
//! |-------------|--------------|-------------------------------------|
//! | `http`      | HttpClient   | ESP-IDF HTTP client (TLS bundle)    |
//! | `nvs`       | StoragePort  | NVS / in-memory store               |
//! | `flash`     | FlashDriver  | esp-ota partition writer / in-memory|
//! | `system`    | SystemPort   | ESP-IDF heap statistics             |
//! | `log_sink`  | -            | Serial log output for client events |
//! | `device_id` | -            | eFuse MAC                           |
//! | `wifi`      | -            | ESP-IDF WiFi STA (firmware only)    |

pub mod device_id;
pub mod flash;
#[cfg(target_os = "espidf")]
pub mod http;
pub mod log_sink;
pub mod nvs;
pub mod system;
pub mod wifi;
