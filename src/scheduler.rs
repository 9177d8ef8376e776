//! Report scheduling.
//!
//! One [`ReportScheduler`] per channel decides, once per poll, whether the
//! channel's reading should go out:
//!
//! ```text
//!   disabled ──────────────────────────────▶ nothing (bookkeeping reset)
//!   new activity ∧ elapsed ≥ min_interval ─▶ CHANGE
//!   elapsed > max_interval ────────────────▶ TIMEOUT (power forced to 0)
//!   otherwise ─────────────────────────────▶ nothing
//! ```
//!
//! Activity inside the min-interval floor is not dropped; it stays pending
//! and fires on the first poll after the floor.
//!
//! [`IntervalTimer`] drives the node's periodic maintenance (auto-save,
//! calibration dump) on the same wrap-safe clock.

use crate::app::events::ReportReason;
use crate::config::ReportPolicy;
use crate::timing::elapsed_ms;

// ═══════════════════════════════════════════════════════════════
//  Per-channel report policy
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportScheduler {
    active: bool,
    last_report_ms: u32,
    /// `activity_seq` as of the previous report.
    reported_seq: u32,
}

impl ReportScheduler {
    pub const fn new() -> Self {
        Self {
            active: false,
            last_report_ms: 0,
            reported_seq: 0,
        }
    }

    /// Evaluate the policy for this poll.  The caller emits the report and
    /// then calls [`mark_reported`](Self::mark_reported).
    pub fn evaluate(
        &mut self,
        enabled: bool,
        now_ms: u32,
        activity_seq: u32,
        policy: &ReportPolicy,
    ) -> Option<ReportReason> {
        if !enabled {
            self.active = false;
            return None;
        }
        if !self.active {
            self.active = true;
            self.last_report_ms = now_ms;
            self.reported_seq = activity_seq;
            return None;
        }

        let elapsed = elapsed_ms(now_ms, self.last_report_ms);
        if activity_seq != self.reported_seq && elapsed >= policy.min_report_interval_ms {
            Some(ReportReason::Change)
        } else if elapsed > policy.max_report_interval_ms {
            Some(ReportReason::Timeout)
        } else {
            None
        }
    }

    pub fn mark_reported(&mut self, now_ms: u32, activity_seq: u32) {
        self.last_report_ms = now_ms;
        self.reported_seq = activity_seq;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_report_ms(&self) -> u32 {
        self.last_report_ms
    }
}

// ═══════════════════════════════════════════════════════════════
//  Maintenance timer
// ═══════════════════════════════════════════════════════════════

/// Wrap-safe periodic timer.  An interval of `0` never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    since_ms: u32,
}

impl IntervalTimer {
    pub const fn started_at(now_ms: u32) -> Self {
        Self { since_ms: now_ms }
    }

    /// Returns `true` (and restarts) once `interval_ms` has elapsed.
    pub fn fire(&mut self, now_ms: u32, interval_ms: u32) -> bool {
        if interval_ms == 0 || elapsed_ms(now_ms, self.since_ms) < interval_ms {
            return false;
        }
        self.since_ms = now_ms;
        true
    }

    pub fn restart(&mut self, now_ms: u32) {
        self.since_ms = now_ms;
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
