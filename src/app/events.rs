//! Outbound readings.
//!
//! The [`MeteringNode`](super::service::MeteringNode) emits a [`Report`]
//! through the [`ReportSink`](super::ports::ReportSink) port whenever the
//! scheduler decides a channel's reading is worth sending.  Adapters on the
//! other side decide what to do with it (log to serial, encode for a radio
//! gateway).

use serde::Serialize;

/// Why a reading was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportReason {
    /// New pulse activity since the previous report.
    Change,
    /// The maximum quiet interval elapsed without activity.
    Timeout,
}

/// A single channel reading, as handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Report {
    /// Channel index (0-based).
    pub channel: u8,
    /// Instantaneous power in watts; 0 for TIMEOUT reports.
    pub instant_power_w: f32,
    /// Cumulative energy counter after realizing pending pulses.
    pub cumulative_energy_wh: u32,
    pub reason: ReportReason,
    /// Debounced pulses counted since boot.
    pub pulse_count: u32,
    /// Clock value of the most recent edge.
    pub last_pulse_ms: u32,
}
