//! Pulse-to-energy conversion.
//!
//! One [`EnergyAccountant`] per channel turns the monotonic pulse count
//! into whole watt-hours on the channel's cumulative counter.  Each
//! settlement adds `round(delta_pulses × Wh/pulse)`; the fractional part of
//! a settlement is not carried over, so a meter whose Wh-per-pulse is not
//! an integer (e.g. 400 imp/kWh = 2.5 Wh) rounds once per report.

/// Milliseconds per hour; converts Wh/pulse into W·ms/pulse.
const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyAccountant {
    energy_per_pulse_wh: f64,
    power_scale: f32,
    last_reported_pulse_count: u32,
}

impl EnergyAccountant {
    pub const fn new() -> Self {
        Self {
            energy_per_pulse_wh: 0.0,
            power_scale: 0.0,
            last_reported_pulse_count: 0,
        }
    }

    /// Recompute the per-pulse constants.  `0` leaves both constants at zero
    /// (uncalibrated channel, no division).
    pub fn calibrate(&mut self, pulses_per_kwh: u16) {
        if pulses_per_kwh == 0 {
            self.energy_per_pulse_wh = 0.0;
            self.power_scale = 0.0;
            return;
        }
        self.energy_per_pulse_wh = 1000.0 / f64::from(pulses_per_kwh);
        self.power_scale = (MS_PER_HOUR * self.energy_per_pulse_wh) as f32;
    }

    pub fn energy_per_pulse_wh(&self) -> f64 {
        self.energy_per_pulse_wh
    }

    /// Numerator for `instant_power_w = power_scale / interval_ms`.
    pub fn power_scale(&self) -> f32 {
        self.power_scale
    }

    /// Pulses counted but not yet converted.
    pub fn pending_pulses(&self, pulse_count: u32) -> u32 {
        pulse_count.wrapping_sub(self.last_reported_pulse_count)
    }

    /// Forget pending pulses (after a factory reset).
    pub fn rebase(&mut self, pulse_count: u32) {
        self.last_reported_pulse_count = pulse_count;
    }

    /// Convert every pulse since the last call into Wh and add it to
    /// `cumulative_wh`.  Returns the whole Wh added.
    pub fn settle(&mut self, pulse_count: u32, cumulative_wh: &mut u32) -> u32 {
        let delta_pulses = self.pending_pulses(pulse_count);
        self.last_reported_pulse_count = pulse_count;

        let delta_wh = (f64::from(delta_pulses) * self.energy_per_pulse_wh).round();
        let delta_wh = if delta_wh >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            delta_wh as u32
        };
        *cumulative_wh = cumulative_wh.saturating_add(delta_wh);
        delta_wh
    }
}

impl Default for EnergyAccountant {
    fn default() -> Self {
        Self::new()
    }
}
