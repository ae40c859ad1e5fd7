//! Application core: pure update logic, zero I/O.
//!
//! This module contains the OTA update lifecycle: identity bootstrap,
//! availability polling, image download, and flashing. All interaction
//! with the network, NVS and flash happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod adapter;
pub mod client;
pub mod events;
pub mod model;
pub mod ports;
pub mod updater;
