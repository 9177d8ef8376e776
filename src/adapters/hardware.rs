//! Board adapter: bridges the meter-slot GPIOs to domain port traits.
//!
//! Exposes presence detect through [`PresencePort`] and the status LEDs
//! through [`IndicatorPort`].  On non-espidf targets the GPIO helpers are
//! simulation stubs (every slot present, LED writes dropped), and the
//! adapter keeps the last driven LED level for inspection.

use crate::app::ports::{IndicatorPort, PresencePort};
use crate::config::CHANNEL_COUNT;
use crate::drivers::hw_init::{gpio_read, gpio_write};
use crate::pins::{CHANNEL_PINS, ChannelPins};

pub struct BoardAdapter {
    pins: [ChannelPins; CHANNEL_COUNT],
    leds: [bool; CHANNEL_COUNT],
}

impl BoardAdapter {
    pub fn new() -> Self {
        Self::with_pins(CHANNEL_PINS)
    }

    pub fn with_pins(pins: [ChannelPins; CHANNEL_COUNT]) -> Self {
        Self {
            pins,
            leds: [false; CHANNEL_COUNT],
        }
    }

    /// Last level written to `channel`'s LED.
    pub fn indicator(&self, channel: usize) -> Option<bool> {
        self.leds.get(channel).copied()
    }
}

impl Default for BoardAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ── PresencePort implementation ───────────────────────────────

impl PresencePort for BoardAdapter {
    fn is_present(&self, channel: usize) -> bool {
        self.pins
            .get(channel)
            .is_some_and(|p| gpio_read(p.presence))
    }
}

// ── IndicatorPort implementation ──────────────────────────────

impl IndicatorPort for BoardAdapter {
    fn set_indicator(&mut self, channel: usize, lit: bool) {
        let (Some(pins), Some(led)) = (self.pins.get(channel), self.leds.get_mut(channel)) else {
            return;
        };
        gpio_write(pins.led, lit);
        *led = lit;
    }
}
