//! GPIO pin assignments for the four-channel S0 metering board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

use crate::config::CHANNEL_COUNT;

/// Pins belonging to one meter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPins {
    /// S0 pulse input (open collector, internal pull-up, falling edge).
    pub input: i32,
    /// Module-present detect.  HIGH = meter fitted.
    pub presence: i32,
    /// Status LED output (active HIGH).
    pub led: i32,
}

// ---------------------------------------------------------------------------
// Meter slots
// ---------------------------------------------------------------------------

pub const CHANNEL_PINS: [ChannelPins; CHANNEL_COUNT] = [
    ChannelPins { input: 4, presence: 10, led: 35 },
    ChannelPins { input: 5, presence: 11, led: 36 },
    ChannelPins { input: 6, presence: 12, led: 37 },
    ChannelPins { input: 7, presence: 13, led: 38 },
];
