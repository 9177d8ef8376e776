//! Port traits: the hexagonal boundary between metering logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MeteringNode (domain)
//! ```
//!
//! Driven adapters (EEPROM, presence pins, indicator LEDs, report transport,
//! clock) implement these traits.  The [`MeteringNode`](super::service::MeteringNode)
//! consumes them via generics, so the domain core never touches hardware
//! directly and runs unchanged against in-memory fakes on the host.
//!
//! ## Write endurance
//!
//! - [`PersistentStore`] cells wear out.  The core only writes on explicit
//!   mutation, skips cells that already hold the target value, and issues
//!   one [`commit`](PersistentStore::commit) per persist.

use super::events::Report;

// ───────────────────────────────────────────────────────────────
// Persistent store (driven adapter: domain ↔ EEPROM / NVS)
// ───────────────────────────────────────────────────────────────

/// Byte-addressable non-volatile region holding the calibration image.
pub trait PersistentStore {
    /// Size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Read one byte.  Offsets past [`capacity`](Self::capacity) read as `0xFF`
    /// (erased cell).
    fn read_byte(&self, offset: usize) -> u8;

    /// Write one byte.  Synchronous and bounded in duration.
    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), StorageError>;

    /// Flush buffered writes to the medium.  Called exactly once at the end
    /// of every persist.  Byte-granular EEPROMs need not override this.
    fn commit(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Report sink (driven adapter: domain → telemetry transport)
// ───────────────────────────────────────────────────────────────

/// Receives one call per emitted reading.  Encoding and transport are the
/// adapter's business.
pub trait ReportSink {
    fn report(&mut self, report: &Report);
}

// ───────────────────────────────────────────────────────────────
// Board I/O (driven adapter: domain ↔ GPIO)
// ───────────────────────────────────────────────────────────────

/// Physical "module present" signal, one per channel.
pub trait PresencePort {
    fn is_present(&self, channel: usize) -> bool;
}

/// Per-channel status LED.
pub trait IndicatorPort {
    fn set_indicator(&mut self, channel: usize, lit: bool);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Free-running millisecond counter.  Wraps at `u32::MAX`; consumers use
/// [`elapsed_ms`](crate::timing::elapsed_ms) and never compare raw values.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`PersistentStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Offset lies outside the region.
    OutOfRange,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "offset out of range"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
