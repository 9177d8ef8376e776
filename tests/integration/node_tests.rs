//! Integration tests for the edge → poll → report pipeline.
//!
//! Pulse edges are injected straight into the `PulseChannel`s (standing in
//! for the GPIO ISR) and the node is polled with an explicit clock.

use super::mock_hw::{MockBoard, MockEeprom, RecordingSink, boot, boot_with};

use s0meter::app::commands::AppCommand;
use s0meter::app::events::ReportReason;
use s0meter::calibration::{CalibrationBlock, encode_image};
use s0meter::config::CHANNEL_COUNT;
use s0meter::sensors::pulse::PulseChannel;

fn channels() -> [PulseChannel; CHANNEL_COUNT] {
    Default::default()
}

fn fast_intervals() -> AppCommand {
    AppCommand::SetReportIntervals {
        min_ms: 1_000,
        max_ms: 60_000,
    }
}

// ── CHANGE path ───────────────────────────────────────────────

#[test]
fn two_edges_500ms_apart_report_7200_watts() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    ch[0].on_edge(1_000);
    ch[0].on_edge(1_500);

    let snap = node.channel_snapshot(0).unwrap();
    assert_eq!(snap.pulse_count, 1, "first edge only arms the timer");
    assert!((snap.instant_power_w - 7200.0).abs() < 0.01);

    node.poll(30_000, &mut hw, &mut sink);
    assert!(sink.for_channel(0).is_empty(), "inside the 60 s floor");

    node.poll(60_000, &mut hw, &mut sink);
    let r = sink.last_for(0).expect("CHANGE report");
    assert_eq!(r.reason, ReportReason::Change);
    assert!((r.instant_power_w - 7200.0).abs() < 0.01);
    assert_eq!(r.cumulative_energy_wh, 1);
    assert_eq!(r.pulse_count, 1);
    assert_eq!(r.last_pulse_ms, 1_500);

    assert_eq!(
        node.channel_snapshot(0).unwrap().instant_power_w,
        0.0,
        "power cleared after a CHANGE report"
    );
}

#[test]
fn bounces_do_not_count() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    for t in (100..1_000).step_by(20) {
        ch[2].on_edge(t);
    }
    let snap = node.channel_snapshot(2).unwrap();
    assert_eq!(snap.pulse_count, 0);
    assert_eq!(snap.rejected_edges, 44);
}

#[test]
fn change_rate_is_bounded_by_min_interval() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(fast_intervals(), 0).unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    // A pulse every 100 ms for 10 s, polled every 50 ms.
    let mut report_times = Vec::new();
    for t in (50..=10_000u32).step_by(50) {
        if t % 100 == 0 {
            ch[1].on_edge(t);
        }
        let before = sink.for_channel(1).len();
        node.poll(t, &mut hw, &mut sink);
        if sink.for_channel(1).len() > before {
            report_times.push(t);
        }
    }
    for pair in report_times.windows(2) {
        assert!(pair[1] - pair[0] >= 1_000, "reports at {pair:?}");
    }
    assert_eq!(sink.count(1, ReportReason::Change), 10);
    assert_eq!(report_times.len(), 10);
}

#[test]
fn energy_is_conserved_across_reports() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(fast_intervals(), 0).unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    let mut t = 0;
    for _ in 0..=25 {
        t += 400;
        ch[0].on_edge(t);
        node.poll(t, &mut hw, &mut sink);
    }
    node.poll(t + 1_000, &mut hw, &mut sink);

    let r = sink.last_for(0).unwrap();
    assert_eq!(r.pulse_count, 25);
    assert_eq!(r.cumulative_energy_wh, 25);

    let mut prev = 0;
    for r in sink.for_channel(0) {
        assert!(r.cumulative_energy_wh >= prev);
        prev = r.cumulative_energy_wh;
    }
}

#[test]
fn arming_edge_alone_reports_change_without_energy() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(fast_intervals(), 0).unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    ch[0].on_edge(100);
    node.poll(2_000, &mut hw, &mut sink);

    let r = sink.last_for(0).expect("arming edge is new activity");
    assert_eq!(r.reason, ReportReason::Change);
    assert_eq!(r.pulse_count, 0);
    assert_eq!(r.instant_power_w, 0.0);
    assert_eq!(r.cumulative_energy_wh, 0);
    assert_eq!(r.last_pulse_ms, 100);
}

#[test]
fn bounce_edge_alone_reports_change_without_energy() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(fast_intervals(), 0).unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    ch[0].on_edge(100);
    ch[0].on_edge(960);
    node.poll(1_000, &mut hw, &mut sink);
    let first = sink.last_for(0).unwrap();
    assert_eq!(first.pulse_count, 1);
    assert_eq!(first.cumulative_energy_wh, 1);

    // 50 ms after the last edge: rejected, but it still moves the timestamp.
    ch[0].on_edge(1_010);
    node.poll(2_000, &mut hw, &mut sink);

    let r = sink.last_for(0).unwrap();
    assert_eq!(sink.count(0, ReportReason::Change), 2);
    assert_eq!(r.reason, ReportReason::Change);
    assert_eq!(r.pulse_count, 1);
    assert_eq!(r.instant_power_w, 0.0);
    assert_eq!(r.cumulative_energy_wh, first.cumulative_energy_wh);
    assert_eq!(r.last_pulse_ms, 1_010);
    assert_eq!(node.channel_snapshot(0).unwrap().rejected_edges, 1);
}

// ── TIMEOUT path ──────────────────────────────────────────────

#[test]
fn quiet_channel_times_out_with_zero_power() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(fast_intervals(), 0).unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    ch[0].on_edge(100);
    ch[0].on_edge(600);
    node.poll(1_000, &mut hw, &mut sink);
    let change = sink.last_for(0).unwrap();
    assert_eq!(change.reason, ReportReason::Change);
    assert_eq!(change.cumulative_energy_wh, 1);

    node.poll(61_000, &mut hw, &mut sink);
    assert_eq!(sink.for_channel(0).len(), 1, "60 000 ms is not yet > max");

    node.poll(62_000, &mut hw, &mut sink);
    let timeout = sink.last_for(0).unwrap();
    assert_eq!(timeout.reason, ReportReason::Timeout);
    assert_eq!(timeout.instant_power_w, 0.0);
    assert_eq!(timeout.cumulative_energy_wh, change.cumulative_energy_wh);
}

#[test]
fn timeout_across_clock_wrap() {
    let start = u32::MAX - 10_000;
    let ch = channels();
    let mut node = boot_with(MockEeprom::blank(), &ch, start);
    node.handle_command(fast_intervals(), start).unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(start, &mut hw, &mut sink);
    node.poll(start.wrapping_add(60_000), &mut hw, &mut sink);
    assert!(sink.reports.is_empty());
    node.poll(start.wrapping_add(60_001), &mut hw, &mut sink);
    assert_eq!(sink.count(3, ReportReason::Timeout), 1);
}

// ── Enablement ────────────────────────────────────────────────

#[test]
fn absent_slot_never_reports() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(fast_intervals(), 0).unwrap();
    let mut hw = MockBoard::new();
    hw.present[2] = false;
    let mut sink = RecordingSink::new();

    for t in (0..200_000).step_by(500) {
        ch[2].on_edge(t);
        node.poll(t, &mut hw, &mut sink);
    }
    assert!(sink.for_channel(2).is_empty());
    assert_eq!(node.channel_snapshot(2).unwrap().pulse_count, 0);
    assert_eq!(hw.led(2), Some(false));
}

#[test]
fn uncalibrated_device_is_disabled() {
    let mut block = CalibrationBlock::factory();
    block.devices.get_mut(1).unwrap().pulses_per_kwh = 0;
    let eeprom = MockEeprom::with_image(encode_image(&block).unwrap());

    let ch = channels();
    let mut node = boot_with(eeprom, &ch, 0);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    for t in (0..100_000_000u32).step_by(1_000_000) {
        ch[1].on_edge(t);
        node.poll(t, &mut hw, &mut sink);
    }
    assert!(sink.for_channel(1).is_empty());
    assert!(!sink.for_channel(0).is_empty(), "calibrated neighbour still times out");
}

#[test]
fn reinsertion_rearms_first_pulse() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    ch[0].on_edge(100);
    ch[0].on_edge(600);
    assert_eq!(node.channel_snapshot(0).unwrap().pulse_count, 1);

    hw.present[0] = false;
    node.poll(1_000, &mut hw, &mut sink);
    hw.present[0] = true;
    node.poll(2_000, &mut hw, &mut sink);

    ch[0].on_edge(5_000);
    let snap = node.channel_snapshot(0).unwrap();
    assert_eq!(snap.pulse_count, 1, "arming edge after re-enable not counted");
    assert_eq!(snap.instant_power_w, 0.0);
}

// ── Indicator ─────────────────────────────────────────────────

#[test]
fn indicator_blinks_dark_on_pulse() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    assert_eq!(hw.led(0), Some(true));
    let writes = hw.led_calls.len();
    node.poll(50, &mut hw, &mut sink);
    assert_eq!(hw.led_calls.len(), writes, "no rewrite when unchanged");

    ch[0].on_edge(100);
    ch[0].on_edge(1_100);
    node.poll(1_150, &mut hw, &mut sink);
    assert_eq!(hw.led(0), Some(false));
    node.poll(1_400, &mut hw, &mut sink);
    assert_eq!(hw.led(0), Some(true));
}

// ── Persistence of energy ─────────────────────────────────────

#[test]
fn save_energy_survives_reboot() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    for i in 0..=10u32 {
        ch[3].on_edge(1_000 + i * 500);
    }
    node.handle_command(AppCommand::SaveEnergy, 10_000).unwrap();
    assert_eq!(node.pending_pulses(3), Some(0));

    let image = node.calibration().store().cells;
    let rebooted: [PulseChannel; CHANNEL_COUNT] = Default::default();
    let node = boot_with(MockEeprom::with_image(image), &rebooted, 0);
    assert_eq!(
        node.calibration().device(3).unwrap().cumulative_energy_wh,
        10
    );
}

#[test]
fn energy_is_never_persisted_implicitly() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(fast_intervals(), 0).unwrap();
    let commits = node.calibration().store().commits;
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    for t in (0..3_000_000u32).step_by(250) {
        ch[0].on_edge(t);
        node.poll(t, &mut hw, &mut sink);
    }
    assert!(sink.count(0, ReportReason::Change) > 100);
    assert_eq!(node.calibration().store().commits, commits);
}

#[test]
fn auto_save_persists_only_changes() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(AppCommand::SetAutoSaveInterval(10_000), 0)
        .unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    ch[0].on_edge(1_000);
    ch[0].on_edge(2_000);
    ch[0].on_edge(3_000);
    let commits = node.calibration().store().commits;

    node.poll(10_000, &mut hw, &mut sink);
    assert_eq!(node.calibration().store().commits, commits + 1);
    assert_eq!(node.calibration().device(0).unwrap().cumulative_energy_wh, 2);

    node.poll(20_000, &mut hw, &mut sink);
    assert_eq!(
        node.calibration().store().commits,
        commits + 1,
        "nothing changed, nothing written"
    );
}

#[test]
fn factory_reset_command_zeroes_counters() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    node.handle_remote(0, "1=500");
    ch[0].on_edge(1_000);
    ch[0].on_edge(2_000);
    node.handle_command(AppCommand::SaveEnergy, 3_000).unwrap();
    assert_eq!(node.calibration().device(0).unwrap().cumulative_energy_wh, 2);

    node.handle_command(AppCommand::FactoryReset, 4_000).unwrap();
    let d = node.calibration().device(0).unwrap();
    assert_eq!(d.pulses_per_kwh, 1000);
    assert_eq!(d.cumulative_energy_wh, 0);
    assert_eq!(node.pending_pulses(0), Some(0));
}
