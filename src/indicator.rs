//! Per-channel status LED.
//!
//! Lit while the channel is enabled, dark for [`INDICATOR_BLANK_MS`] after
//! every counted pulse, so a glance at the board shows both "meter fitted"
//! and pulse activity.  [`PulseIndicator::update`] returns a level only when
//! it differs from what was last driven.

use crate::config::INDICATOR_BLANK_MS;
use crate::timing::elapsed_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseIndicator {
    driven: Option<bool>,
    seen_pulses: u32,
    blank_since_ms: Option<u32>,
    was_enabled: bool,
}

impl PulseIndicator {
    pub const fn new() -> Self {
        Self {
            driven: None,
            seen_pulses: 0,
            blank_since_ms: None,
            was_enabled: false,
        }
    }

    pub fn update(&mut self, enabled: bool, pulse_count: u32, now_ms: u32) -> Option<bool> {
        if enabled && !self.was_enabled {
            self.seen_pulses = pulse_count;
            self.blank_since_ms = None;
        }
        self.was_enabled = enabled;

        let lit = if enabled {
            if pulse_count != self.seen_pulses {
                self.seen_pulses = pulse_count;
                self.blank_since_ms = Some(now_ms);
            }
            match self.blank_since_ms {
                Some(since) if elapsed_ms(now_ms, since) < INDICATOR_BLANK_MS => false,
                _ => {
                    self.blank_since_ms = None;
                    true
                }
            }
        } else {
            false
        };

        if self.driven == Some(lit) {
            return None;
        }
        self.driven = Some(lit);
        Some(lit)
    }
}
