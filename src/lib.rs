//! S0Meter firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host
//! simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod calibration;
pub mod config;
pub mod device;
pub mod energy;
pub mod error;
pub mod indicator;
pub mod pins;
pub mod scheduler;
pub mod timing;

pub mod adapters;
pub mod drivers;
pub mod sensors;

pub mod esp_link_shims;
