//! Node configuration parameters
//!
//! Compile-time board constants plus the global report policy that is
//! persisted in the calibration image and can be changed at runtime.

use serde::{Deserialize, Serialize};

/// Number of pulse channels on the board.
pub const CHANNEL_COUNT: usize = 4;

/// Maximum model label length in bytes (the historical layout reserved
/// 23 bytes including the NUL terminator).
pub const MODEL_NAME_CAPACITY: usize = 22;

/// Size of the persistent region reserved for the calibration image.
pub const IMAGE_SIZE: usize = 256;

/// Time the channel indicator stays dark after each qualifying pulse.
pub const INDICATOR_BLANK_MS: u32 = 250;

/// Global report policy, stored in the calibration image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPolicy {
    /// Floor between two CHANGE reports of the same channel (milliseconds)
    pub min_report_interval_ms: u32,
    /// A channel reports at least this often, even without pulses (milliseconds)
    pub max_report_interval_ms: u32,
    /// Periodic persistence of cumulative energy; 0 disables it
    pub auto_save_interval_ms: u32,
    /// Periodic calibration dump to the log; 0 disables it
    pub auto_dump_interval_ms: u32,
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self {
            min_report_interval_ms: 60_000,      // at most every minute
            max_report_interval_ms: 86_400_000,  // at least once per day
            auto_save_interval_ms: 0,            // write-endurance: opt-in only
            auto_dump_interval_ms: 86_400_000,   // daily dump
        }
    }
}

impl ReportPolicy {
    /// Check the `0 < min < max` invariant.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.min_report_interval_ms == 0 {
            return Err("min_report_interval_ms must be > 0");
        }
        if self.min_report_interval_ms >= self.max_report_interval_ms {
            return Err("min_report_interval_ms must be < max_report_interval_ms");
        }
        Ok(())
    }
}
