//! Unified error type for the metering firmware.
//!
//! Every subsystem error converts into [`Error`] so board bring-up and the
//! main loop handle failures uniformly.  All variants are `Copy`.

use core::fmt;

use crate::app::commands::CommandError;
use crate::app::ports::StorageError;
use crate::calibration::{CalibrationError, ImageError};
use crate::drivers::hw_init::HwInitError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The persistent store rejected a read or write.
    Storage(StorageError),
    /// A calibration update was refused or could not be persisted.
    Calibration(CalibrationError),
    /// A remote configuration payload could not be parsed.
    Command(CommandError),
    /// Peripheral initialisation failed.
    Init(HwInitError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        match e {
            CalibrationError::Storage(s) => Self::Storage(s),
            other => Self::Calibration(other),
        }
    }
}

impl From<ImageError> for Error {
    fn from(e: ImageError) -> Self {
        Self::Calibration(CalibrationError::Image(e))
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(e)
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
