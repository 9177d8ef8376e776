//! Per-channel meter descriptors and the fixed-capacity registry.
//!
//! A [`Device`] records the calibration of the meter wired to one channel
//! (pulses per kWh, minimum valid pulse width, a free-form label) together
//! with its cumulative energy counter.  The [`DeviceRegistry`] holds one
//! record per channel and is the single source of truth for whether a
//! channel may count pulses.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::config::{CHANNEL_COUNT, MODEL_NAME_CAPACITY};

/// Bounded model label.
pub type ModelName = String<MODEL_NAME_CAPACITY>;

/// Known meter models and their datasheet pulse characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterPreset {
    pub pulses_per_kwh: u16,
    pub min_pulse_width_ms: u16,
}

/// DRS155-D DIN-rail meter: 1000 imp/kWh, 90 ms pulses.
pub const DRS155_D: MeterPreset = MeterPreset {
    pulses_per_kwh: 1000,
    min_pulse_width_ms: 90,
};

/// Label written on factory reset.
pub const DEFAULT_MODEL_NAME: &str = "DEFAULT";

/// Persisted calibration + energy counter for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub pulses_per_kwh: u16,
    pub min_pulse_width_ms: u16,
    pub model_name: ModelName,
    pub cumulative_energy_wh: u32,
}

impl Device {
    /// Factory record for a fresh channel.
    pub fn factory() -> Self {
        Self::from_preset(DRS155_D, DEFAULT_MODEL_NAME)
    }

    /// Build a zero-energy record from a meter preset.  `label` is truncated
    /// to [`MODEL_NAME_CAPACITY`] bytes.
    pub fn from_preset(preset: MeterPreset, label: &str) -> Self {
        Self {
            pulses_per_kwh: preset.pulses_per_kwh,
            min_pulse_width_ms: preset.min_pulse_width_ms,
            model_name: truncated_name(label),
            cumulative_energy_wh: 0,
        }
    }

    /// A channel may only count and report when both constants are non-zero.
    pub fn is_calibrated(&self) -> bool {
        self.pulses_per_kwh > 0 && self.min_pulse_width_ms > 0
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::factory()
    }
}

/// Returns `true` if `label` is non-empty and every byte is printable
/// ASCII (`0x20..=0x7E`).
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Copy `label` into a [`ModelName`], cutting at the last char boundary
/// that fits.
pub fn truncated_name(label: &str) -> ModelName {
    let mut name = ModelName::new();
    for ch in label.chars() {
        if name.push(ch).is_err() {
            break;
        }
    }
    name
}

/// Fixed-capacity array of [`Device`] indexed by channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistry {
    devices: [Device; CHANNEL_COUNT],
}

impl DeviceRegistry {
    /// Registry with every channel at factory defaults.
    pub fn factory() -> Self {
        Self {
            devices: core::array::from_fn(|_| Device::factory()),
        }
    }

    pub fn get(&self, channel: usize) -> Option<&Device> {
        self.devices.get(channel)
    }

    pub fn get_mut(&mut self, channel: usize) -> Option<&mut Device> {
        self.devices.get_mut(channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Enabled = presence signal asserted AND the record is calibrated.
    /// Unknown channels are never enabled.
    pub fn is_enabled(&self, channel: usize, present: bool) -> bool {
        present && self.get(channel).is_some_and(Device::is_calibrated)
    }

    /// Sum of every channel's cumulative counter, used to detect unsaved
    /// energy.
    pub fn total_energy_wh(&self) -> u64 {
        self.devices
            .iter()
            .map(|d| u64::from(d.cumulative_energy_wh))
            .sum()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::factory()
    }
}
