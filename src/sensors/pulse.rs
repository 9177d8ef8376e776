//! S0 pulse input: debounce and edge counting.
//!
//! ## Hardware
//!
//! The meter's S0 output pulls the input low for at least
//! `min_pulse_width_ms` per energy increment.  The GPIO fires on the
//! falling edge and the ISR calls [`PulseChannel::on_edge`] with the
//! current millisecond clock.
//!
//! ## States
//!
//! | Phase      | On edge                                               |
//! |------------|-------------------------------------------------------|
//! | `Disabled` | ignored                                               |
//! | `Armed`    | timestamp recorded, nothing counted → `Tracking`      |
//! | `Tracking` | interval measured; too short = bounce, else one pulse |
//!
//! Every transition Disabled → enabled passes through `Armed` again, so
//! the first edge after (re)enable never yields a power sample.
//!
//! ## Concurrency
//!
//! All ISR-visible fields live in one `Copy` `EdgeState` behind a
//! critical-section mutex.  An edge update and a poll snapshot are each a
//! single short critical section, so the poll loop never observes a
//! half-applied edge.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::timing::elapsed_ms;

/// Edge-handler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disabled,
    /// Enabled, waiting for the edge that starts interval timing.
    Armed,
    Tracking,
}

#[derive(Debug, Clone, Copy)]
struct EdgeState {
    phase: Phase,
    pulse_count: u32,
    last_pulse_ms: u32,
    instant_power_w: f32,
    /// Bumped every time `last_pulse_ms` moves.
    activity_seq: u32,
    rejected_edges: u32,
    min_pulse_width_ms: u32,
    /// Watt-milliseconds per pulse (`3_600_000 × Wh/pulse`).
    power_scale: f32,
}

impl EdgeState {
    const INIT: Self = Self {
        phase: Phase::Disabled,
        pulse_count: 0,
        last_pulse_ms: 0,
        instant_power_w: 0.0,
        activity_seq: 0,
        rejected_edges: 0,
        min_pulse_width_ms: 0,
        power_scale: 0.0,
    };
}

/// Consistent copy of one channel's edge state, taken by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSnapshot {
    pub phase: Phase,
    pub pulse_count: u32,
    pub last_pulse_ms: u32,
    pub instant_power_w: f32,
    pub activity_seq: u32,
    pub rejected_edges: u32,
}

impl ChannelSnapshot {
    pub fn is_enabled(&self) -> bool {
        self.phase != Phase::Disabled
    }
}

/// Debounce/count state machine for one physical input.
///
/// `Sync`: the ISR holds a `&'static PulseChannel` while the main loop
/// polls the same instance.
pub struct PulseChannel {
    state: Mutex<CriticalSectionRawMutex, Cell<EdgeState>>,
}

impl PulseChannel {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(EdgeState::INIT)),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut EdgeState) -> R) -> R {
        self.state.lock(|cell| {
            let mut s = cell.get();
            let out = f(&mut s);
            cell.set(s);
            out
        })
    }

    /// Falling-edge entry point.  Safe to call from interrupt context.
    pub fn on_edge(&self, now_ms: u32) {
        self.update(|s| match s.phase {
            Phase::Disabled => {}
            Phase::Armed => {
                s.last_pulse_ms = now_ms;
                s.activity_seq = s.activity_seq.wrapping_add(1);
                s.phase = Phase::Tracking;
            }
            Phase::Tracking => {
                let length_ms = elapsed_ms(now_ms, s.last_pulse_ms);
                s.last_pulse_ms = now_ms;
                s.activity_seq = s.activity_seq.wrapping_add(1);

                if length_ms == 0 || length_ms < s.min_pulse_width_ms {
                    s.rejected_edges = s.rejected_edges.wrapping_add(1);
                    return;
                }
                s.pulse_count = s.pulse_count.wrapping_add(1);
                s.instant_power_w = s.power_scale / length_ms as f32;
            }
        });
    }

    /// Apply the poll loop's enablement decision.  Returns `true` when the
    /// phase changed between disabled and enabled.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.update(|s| match (s.phase, enabled) {
            (Phase::Disabled, true) => {
                s.phase = Phase::Armed;
                true
            }
            (Phase::Armed | Phase::Tracking, false) => {
                s.phase = Phase::Disabled;
                s.instant_power_w = 0.0;
                true
            }
            _ => false,
        })
    }

    /// Push fresh calibration constants to the edge handler.
    pub fn configure(&self, min_pulse_width_ms: u16, power_scale: f32) {
        self.update(|s| {
            s.min_pulse_width_ms = u32::from(min_pulse_width_ms);
            s.power_scale = power_scale;
        });
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        let s = self.state.lock(|cell| cell.get());
        ChannelSnapshot {
            phase: s.phase,
            pulse_count: s.pulse_count,
            last_pulse_ms: s.last_pulse_ms,
            instant_power_w: s.instant_power_w,
            activity_seq: s.activity_seq,
            rejected_edges: s.rejected_edges,
        }
    }

    /// Zero the instantaneous power after a report, unless an edge arrived
    /// after the snapshot tagged `seen_seq`.  Returns `true` if cleared.
    pub fn clear_power(&self, seen_seq: u32) -> bool {
        self.update(|s| {
            if s.activity_seq != seen_seq {
                return false;
            }
            s.instant_power_w = 0.0;
            true
        })
    }
}

impl Default for PulseChannel {
    fn default() -> Self {
        Self::new()
    }
}
