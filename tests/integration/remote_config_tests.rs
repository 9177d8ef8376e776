//! Remote configuration: query/set payloads routed through the node.

use super::mock_hw::{MockBoard, MockEeprom, RecordingSink, boot, boot_with};

use s0meter::app::commands::AppCommand;
use s0meter::app::events::ReportReason;
use s0meter::calibration::{CalibrationBlock, encode_image};
use s0meter::config::CHANNEL_COUNT;
use s0meter::device::DEFAULT_MODEL_NAME;
use s0meter::sensors::pulse::PulseChannel;

fn channels() -> [PulseChannel; CHANNEL_COUNT] {
    Default::default()
}

#[test]
fn queries_render_current_values() {
    let ch = channels();
    let mut node = boot(&ch);

    assert_eq!(node.handle_remote(0, "1").unwrap().as_str(), "1000");
    assert_eq!(node.handle_remote(0, "2").unwrap().as_str(), "90");
    assert_eq!(node.handle_remote(0, "3").unwrap().as_str(), DEFAULT_MODEL_NAME);
}

#[test]
fn queries_never_write() {
    let ch = channels();
    let mut node = boot(&ch);
    let commits = node.calibration().store().commits;

    for payload in ["1", "2", "3", "4"] {
        node.handle_remote(2, payload);
    }
    assert_eq!(node.calibration().store().commits, commits);
}

#[test]
fn combined_set_persists_once() {
    let ch = channels();
    let mut node = boot(&ch);
    let commits = node.calibration().store().commits;

    assert!(node.handle_remote(1, "4=500,100,Meter-A").is_none());
    assert_eq!(node.calibration().store().commits, commits + 1);

    let d = node.calibration().device(1).unwrap();
    assert_eq!(d.pulses_per_kwh, 500);
    assert_eq!(d.min_pulse_width_ms, 100);
    assert_eq!(d.model_name.as_str(), "Meter-A");

    assert_eq!(
        node.handle_remote(1, "4").unwrap().as_str(),
        "500,100,Meter-A"
    );
    // Neighbouring channels untouched.
    assert_eq!(node.calibration().device(0).unwrap().pulses_per_kwh, 1000);
}

#[test]
fn combined_set_keeps_commas_in_label() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_remote(0, "4=800,50,Hall, floor 2");
    assert_eq!(
        node.calibration().device(0).unwrap().model_name.as_str(),
        "Hall, floor 2"
    );
}

#[test]
fn long_label_is_truncated() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_remote(3, "3=ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    assert_eq!(
        node.handle_remote(3, "3").unwrap().as_str(),
        "ABCDEFGHIJKLMNOPQRSTUV"
    );
}

#[test]
fn malformed_payloads_change_nothing() {
    let ch = channels();
    let mut node = boot(&ch);
    let before = node.calibration().block().clone();
    let commits = node.calibration().store().commits;

    for payload in [
        "", "=", "1=", "1=0", "1=abc", "1=70000", "2=-5", "9", "9=1", "3=",
        "3=bad\u{7f}", "4=500,100", "4=0,100,X", "4=500,0,X", "4=500,100,",
    ] {
        assert!(node.handle_remote(0, payload).is_none(), "{payload:?}");
    }
    assert!(node.handle_remote(CHANNEL_COUNT, "1").is_none());
    assert!(node.handle_remote(CHANNEL_COUNT, "1=500").is_none());

    assert_eq!(node.calibration().block(), &before);
    assert_eq!(node.calibration().store().commits, commits);
}

#[test]
fn pending_pulses_settle_at_old_rate() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    ch[0].on_edge(1_000);
    ch[0].on_edge(2_000);
    ch[0].on_edge(3_000);
    assert_eq!(node.pending_pulses(0), Some(2));

    // 2 pulses at 1 Wh each, then 2 Wh per pulse from here on.
    node.handle_remote(0, "1=500");
    assert_eq!(node.pending_pulses(0), Some(0));
    assert_eq!(node.calibration().device(0).unwrap().cumulative_energy_wh, 2);

    ch[0].on_edge(4_000);
    let snap = node.channel_snapshot(0).unwrap();
    assert!((snap.instant_power_w - 7200.0).abs() < 0.01);

    node.save_energy().unwrap();
    assert_eq!(node.calibration().device(0).unwrap().cumulative_energy_wh, 4);
}

#[test]
fn new_min_width_reaches_edge_handler() {
    let ch = channels();
    let mut node = boot(&ch);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    node.handle_remote(0, "2=500");
    ch[0].on_edge(1_000);
    ch[0].on_edge(1_300);
    assert_eq!(node.channel_snapshot(0).unwrap().pulse_count, 0);
    ch[0].on_edge(1_800);
    assert_eq!(node.channel_snapshot(0).unwrap().pulse_count, 1);
}

#[test]
fn storage_failure_still_applies_in_memory() {
    let mut eeprom = MockEeprom::with_image(encode_image(&CalibrationBlock::factory()).unwrap());
    eeprom.fail_writes = true;
    let stored = eeprom.cells;

    let ch = channels();
    let mut node = boot_with(eeprom, &ch, 0);
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    node.handle_remote(0, "1=500");
    assert_eq!(node.calibration().device(0).unwrap().pulses_per_kwh, 500);
    assert_eq!(node.calibration().store().cells, stored);

    ch[0].on_edge(0);
    ch[0].on_edge(1_000);
    let snap = node.channel_snapshot(0).unwrap();
    assert!((snap.instant_power_w - 7200.0).abs() < 0.01);
}

#[test]
fn label_whitespace_is_trimmed() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_remote(0, "3= Meter");
    assert_eq!(node.handle_remote(0, "3").unwrap().as_str(), "Meter");
    node.handle_remote(1, "4=500,100, Meter-A");
    assert_eq!(
        node.handle_remote(1, "4").unwrap().as_str(),
        "500,100,Meter-A"
    );
}

#[test]
fn fractional_rate_rounds_once_per_report() {
    let ch = channels();
    let mut node = boot(&ch);
    node.handle_command(
        AppCommand::SetReportIntervals {
            min_ms: 1_000,
            max_ms: 60_000,
        },
        0,
    )
    .unwrap();
    let mut hw = MockBoard::new();
    let mut sink = RecordingSink::new();

    node.poll(0, &mut hw, &mut sink);
    node.handle_remote(0, "1=400"); // 2.5 Wh per pulse
    ch[0].on_edge(100);
    for k in 1..=4u32 {
        ch[0].on_edge(k * 2_000);
        node.poll(k * 2_000 + 500, &mut hw, &mut sink);
    }

    let totals: Vec<u32> = sink
        .for_channel(0)
        .iter()
        .filter(|r| r.reason == ReportReason::Change)
        .map(|r| r.cumulative_energy_wh)
        .collect();
    assert_eq!(totals, [3, 6, 9, 12]);
}
