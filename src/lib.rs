//! OTAM over-the-air update client library.
//!
//! Exposes the update lifecycle for integration testing and for firmware
//! binaries. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod json;
pub mod stream;

// The ESP-IDF implementations are guarded by cfg attributes inside; the
// host build gets the simulation backends.
pub mod adapters;
