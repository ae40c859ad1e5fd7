//! ESP32 system adapter.
//!
//! Heap statistics for download admission, and the final restart.
//!
//! - **`target_os = "espidf"`** wraps `esp_get_free_heap_size()`.
//! - **`not(target_os = "espidf")`** reports a fixed free-heap figure for
//!   host-side testing and simulation.

use crate::app::ports::SystemPort;

/// Free heap reported by the simulation backend (bytes).
#[cfg(not(target_os = "espidf"))]
pub const SIM_FREE_HEAP: usize = 4 * 1024 * 1024;

pub struct Esp32System {
    #[cfg(not(target_os = "espidf"))]
    free_heap: usize,
}

impl Default for Esp32System {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32System {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            free_heap: SIM_FREE_HEAP,
        }
    }

    /// Simulation backend reporting `free_heap` bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_free_heap(free_heap: usize) -> Self {
        Self { free_heap }
    }
}

impl SystemPort for Esp32System {
    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> usize {
        (unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }) as usize
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> usize {
        self.free_heap
    }
}

/// Soft-reset into the boot partition.
#[cfg(target_os = "espidf")]
pub fn restart() -> ! {
    log::info!("System: restarting");
    esp_ota::restart();
}

#[cfg(not(target_os = "espidf"))]
pub fn restart() -> ! {
    panic!("restart (simulation: no real hardware reset)");
}
