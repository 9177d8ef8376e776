//! Log-based report sink adapter.
//!
//! Implements [`ReportSink`] by writing every reading to the ESP-IDF
//! logger (UART / USB-CDC in production): one human-readable line plus the
//! JSON payload a gateway bridge can scrape.  A radio transport would
//! implement the same trait.

use log::{info, warn};

use crate::app::events::{Report, ReportReason};
use crate::app::ports::ReportSink;

/// Adapter that logs every [`Report`] to the serial console.
#[derive(Debug, Default)]
pub struct LogReportSink {
    sent: u32,
}

impl LogReportSink {
    pub fn new() -> Self {
        Self { sent: 0 }
    }

    /// Reports written so far.
    pub fn sent(&self) -> u32 {
        self.sent
    }
}

/// JSON form of a report.
pub fn to_json(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string(report)
}

impl ReportSink for LogReportSink {
    fn report(&mut self, report: &Report) {
        let reason = match report.reason {
            ReportReason::Change => "CHANGE",
            ReportReason::Timeout => "TIMEOUT",
        };
        info!(
            "REPORT | ch{} | {} | P={:.1}W | E={}Wh | pulses={}",
            report.channel,
            reason,
            report.instant_power_w,
            report.cumulative_energy_wh,
            report.pulse_count,
        );
        match to_json(report) {
            Ok(json) => info!("REPORT | json={}", json),
            Err(e) => warn!("REPORT | JSON encode failed: {}", e),
        }
        self.sent = self.sent.wrapping_add(1);
    }
}
