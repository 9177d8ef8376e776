//! Application core: pure metering logic, zero I/O.
//!
//! Pulse accounting, report scheduling and remote configuration live here.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
