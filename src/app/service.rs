//! Application service: the hexagonal core.
//!
//! [`MeteringNode`] owns the calibration store and the per-channel
//! accounting, scheduling and indicator state.  The pulse channels
//! themselves are borrowed, because the edge ISR needs a `'static`
//! reference to the same instances.  All I/O flows through port traits
//! injected at call sites.
//!
//! ```text
//!   edge ISR ──▶ PulseChannel ─┐
//!                              ▼
//!  PresencePort ──▶ ┌────────────────────────┐ ──▶ ReportSink
//!                   │      MeteringNode       │
//! IndicatorPort ◀── │ Energy · Scheduler · LED│ ◀── remote config
//!                   └───────────┬────────────┘
//!                               ▼
//!                        CalibrationStore ──▶ PersistentStore
//! ```

use log::{debug, info, warn};

use crate::calibration::{CalibrationError, CalibrationStore};
use crate::config::CHANNEL_COUNT;
use crate::energy::EnergyAccountant;
use crate::indicator::PulseIndicator;
use crate::scheduler::{IntervalTimer, ReportScheduler};
use crate::sensors::pulse::{ChannelSnapshot, PulseChannel};

use super::commands::{AppCommand, ConfigCommand, Reply, format_reply};
use super::events::{Report, ReportReason};
use super::ports::{IndicatorPort, PersistentStore, PresencePort, ReportSink};

/// Poll-side state of one channel.
#[derive(Debug, Clone, Copy, Default)]
struct Lane {
    energy: EnergyAccountant,
    scheduler: ReportScheduler,
    indicator: PulseIndicator,
}

// ───────────────────────────────────────────────────────────────
// MeteringNode
// ───────────────────────────────────────────────────────────────

pub struct MeteringNode<'a, S: PersistentStore> {
    calibration: CalibrationStore<S>,
    channels: &'a [PulseChannel; CHANNEL_COUNT],
    lanes: [Lane; CHANNEL_COUNT],
    auto_save: IntervalTimer,
    auto_dump: IntervalTimer,
    /// Total Wh as of the last successful persist.
    saved_energy_wh: u64,
    reports_sent: u32,
}

impl<'a, S: PersistentStore> MeteringNode<'a, S> {
    /// Derive every channel's constants from the loaded calibration.
    pub fn new(
        calibration: CalibrationStore<S>,
        channels: &'a [PulseChannel; CHANNEL_COUNT],
        now_ms: u32,
    ) -> Self {
        let saved_energy_wh = calibration.devices().total_energy_wh();
        let mut node = Self {
            calibration,
            channels,
            lanes: [Lane::default(); CHANNEL_COUNT],
            auto_save: IntervalTimer::started_at(now_ms),
            auto_dump: IntervalTimer::started_at(now_ms),
            saved_energy_wh,
            reports_sent: 0,
        };
        for ch in 0..CHANNEL_COUNT {
            node.lanes[ch].energy.rebase(channels[ch].snapshot().pulse_count);
            node.apply_calibration(ch);
        }
        info!("MeteringNode ready ({} channels)", CHANNEL_COUNT);
        node
    }

    // ── Per-poll orchestration ────────────────────────────────

    /// Run one poll cycle: enablement → indicator → report decision, for
    /// every channel, then periodic maintenance.
    ///
    /// `hw` satisfies both [`PresencePort`] and [`IndicatorPort`] so a single
    /// board adapter can be passed without a double mutable borrow.
    pub fn poll(
        &mut self,
        now_ms: u32,
        hw: &mut (impl PresencePort + IndicatorPort),
        sink: &mut impl ReportSink,
    ) {
        for ch in 0..CHANNEL_COUNT {
            let present = hw.is_present(ch);
            let enabled = self.calibration.devices().is_enabled(ch, present);
            if self.channels[ch].set_enabled(enabled) {
                info!(
                    "ch{} {}",
                    ch,
                    if enabled { "enabled" } else { "disabled" }
                );
            }

            let snap = self.channels[ch].snapshot();
            let lane = &mut self.lanes[ch];
            if let Some(lit) = lane.indicator.update(enabled, snap.pulse_count, now_ms) {
                hw.set_indicator(ch, lit);
            }

            let policy = *self.calibration.policy();
            if let Some(reason) = lane.scheduler.evaluate(enabled, now_ms, snap.activity_seq, &policy) {
                self.emit(ch, reason, &snap, now_ms, sink);
            }
        }

        self.run_maintenance(now_ms);
    }

    fn emit(
        &mut self,
        ch: usize,
        reason: ReportReason,
        snap: &ChannelSnapshot,
        now_ms: u32,
        sink: &mut impl ReportSink,
    ) {
        let lane = &mut self.lanes[ch];
        let Some(device) = self.calibration.device_mut(ch) else {
            return;
        };
        lane.energy
            .settle(snap.pulse_count, &mut device.cumulative_energy_wh);

        let instant_power_w = match reason {
            ReportReason::Change => snap.instant_power_w,
            ReportReason::Timeout => 0.0,
        };
        let report = Report {
            channel: ch as u8,
            instant_power_w,
            cumulative_energy_wh: device.cumulative_energy_wh,
            reason,
            pulse_count: snap.pulse_count,
            last_pulse_ms: snap.last_pulse_ms,
        };
        sink.report(&report);

        lane.scheduler.mark_reported(now_ms, snap.activity_seq);
        self.channels[ch].clear_power(snap.activity_seq);
        self.reports_sent = self.reports_sent.wrapping_add(1);
    }

    fn run_maintenance(&mut self, now_ms: u32) {
        let policy = *self.calibration.policy();

        if self.auto_save.fire(now_ms, policy.auto_save_interval_ms) {
            self.settle_all();
            if self.calibration.devices().total_energy_wh() != self.saved_energy_wh {
                info!("Auto-save: cumulative energy changed, persisting");
                if let Err(e) = self.persist_energy() {
                    warn!("Auto-save failed: {}", e);
                }
            } else {
                debug!("Auto-save: nothing to do");
            }
        }

        if self.auto_dump.fire(now_ms, policy.auto_dump_interval_ms) {
            self.dump();
        }
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command(&mut self, cmd: AppCommand, now_ms: u32) -> Result<(), CalibrationError> {
        match cmd {
            AppCommand::SaveEnergy => self.save_energy(),
            AppCommand::FactoryReset => {
                self.factory_reset(now_ms);
                Ok(())
            }
            AppCommand::SetReportIntervals { min_ms, max_ms } => {
                self.calibration.set_report_intervals(min_ms, max_ms)
            }
            AppCommand::SetAutoSaveInterval(interval_ms) => {
                self.auto_save.restart(now_ms);
                self.calibration.set_auto_save_interval(interval_ms)
            }
            AppCommand::DumpCalibration => {
                self.dump();
                Ok(())
            }
        }
    }

    /// Apply a remote configuration payload addressed to `channel`.
    ///
    /// Queries return the rendered value.  Sets, malformed payloads and
    /// unknown channels return `None`; rejected input changes nothing.
    pub fn handle_remote(&mut self, channel: usize, payload: &str) -> Option<Reply> {
        let cmd = match ConfigCommand::parse(payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!("ch{} config '{}' dropped: {}", channel, payload, e);
                return None;
            }
        };
        let Some(device) = self.calibration.device(channel) else {
            debug!("config for unknown channel {} dropped", channel);
            return None;
        };

        if let ConfigCommand::Query(field) = cmd {
            return Some(format_reply(field, device));
        }

        // Pulses counted so far belong to the old calibration.
        self.settle(channel);

        let result = match cmd {
            ConfigCommand::Query(_) => Ok(()),
            ConfigCommand::SetPulsesPerKwh(v) => self.calibration.set_pulses_per_kwh(channel, v),
            ConfigCommand::SetMinPulseWidth(v) => self.calibration.set_min_pulse_width(channel, v),
            ConfigCommand::SetModelName(label) => self.calibration.set_model_name(channel, label),
            ConfigCommand::SetAll {
                pulses_per_kwh,
                min_pulse_width_ms,
                model_name,
            } => self
                .calibration
                .set_device(channel, pulses_per_kwh, min_pulse_width_ms, model_name),
        };

        match result {
            Ok(()) => {
                self.saved_energy_wh = self.calibration.devices().total_energy_wh();
                self.apply_calibration(channel);
            }
            Err(CalibrationError::Storage(e)) => {
                warn!("ch{} config applied but not persisted: {}", channel, e);
                self.apply_calibration(channel);
            }
            Err(e) => debug!("ch{} config rejected: {}", channel, e),
        }
        None
    }

    /// Realize pending pulses on every channel and persist the counters.
    pub fn save_energy(&mut self) -> Result<(), CalibrationError> {
        self.settle_all();
        self.persist_energy()
    }

    /// Restore factory calibration, zero the counters and drop any pending
    /// pulses.
    pub fn factory_reset(&mut self, now_ms: u32) {
        self.calibration.factory_reset();
        self.saved_energy_wh = 0;
        for ch in 0..CHANNEL_COUNT {
            self.lanes[ch].energy.rebase(self.channels[ch].snapshot().pulse_count);
            self.apply_calibration(ch);
        }
        self.auto_save.restart(now_ms);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn calibration(&self) -> &CalibrationStore<S> {
        &self.calibration
    }

    pub fn channel_snapshot(&self, channel: usize) -> Option<ChannelSnapshot> {
        self.channels.get(channel).map(PulseChannel::snapshot)
    }

    /// Pulses counted on `channel` but not yet converted to Wh.
    pub fn pending_pulses(&self, channel: usize) -> Option<u32> {
        let snap = self.channel_snapshot(channel)?;
        Some(self.lanes[channel].energy.pending_pulses(snap.pulse_count))
    }

    pub fn reports_sent(&self) -> u32 {
        self.reports_sent
    }

    /// Log persisted calibration plus per-channel runtime counters.
    pub fn dump(&self) {
        self.calibration.dump();
        for (ch, channel) in self.channels.iter().enumerate() {
            let snap = channel.snapshot();
            info!(
                "[runtime] ch{}: {:?} pulses={} rejected={} power={:.1} W pending={}",
                ch,
                snap.phase,
                snap.pulse_count,
                snap.rejected_edges,
                snap.instant_power_w,
                self.lanes[ch].energy.pending_pulses(snap.pulse_count)
            );
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_calibration(&mut self, ch: usize) {
        let Some(device) = self.calibration.device(ch) else {
            return;
        };
        let lane = &mut self.lanes[ch];
        lane.energy.calibrate(device.pulses_per_kwh);
        self.channels[ch].configure(device.min_pulse_width_ms, lane.energy.power_scale());
        debug!(
            "ch{} calibrated: {:.3} Wh/pulse, min width {} ms",
            ch,
            lane.energy.energy_per_pulse_wh(),
            device.min_pulse_width_ms
        );
    }

    fn settle(&mut self, ch: usize) {
        let pulse_count = self.channels[ch].snapshot().pulse_count;
        if let Some(device) = self.calibration.device_mut(ch) {
            self.lanes[ch]
                .energy
                .settle(pulse_count, &mut device.cumulative_energy_wh);
        }
    }

    fn settle_all(&mut self) {
        for ch in 0..CHANNEL_COUNT {
            self.settle(ch);
        }
    }

    fn persist_energy(&mut self) -> Result<(), CalibrationError> {
        self.calibration.persist()?;
        self.saved_energy_wh = self.calibration.devices().total_energy_wh();
        info!("Cumulative energy persisted ({} Wh total)", self.saved_energy_wh);
        Ok(())
    }
}
