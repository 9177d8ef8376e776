//! Fuzz target: remote configuration payloads.
//!
//! Feeds arbitrary text through `ConfigCommand::parse` and, when it parses,
//! through a live node.  Accepted sets must leave the channel calibrated
//! and the stored image decodable.
//!
//! cargo fuzz run fuzz_config_command

#![no_main]

use libfuzzer_sys::fuzz_target;
use s0meter::adapters::eeprom::EepromAdapter;
use s0meter::app::commands::{ConfigCommand, REPLY_CAPACITY};
use s0meter::app::service::MeteringNode;
use s0meter::calibration::{CalibrationStore, decode_image};
use s0meter::config::CHANNEL_COUNT;
use s0meter::sensors::pulse::PulseChannel;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = core::str::from_utf8(data) else {
        return;
    };
    let parsed = ConfigCommand::parse(payload);

    let Ok(eeprom) = EepromAdapter::new() else {
        return;
    };
    let channels: [PulseChannel; CHANNEL_COUNT] = Default::default();
    let mut node = MeteringNode::new(CalibrationStore::load(eeprom), &channels, 0);
    let before = node.calibration().block().clone();

    let reply = node.handle_remote(0, payload);
    if let Some(reply) = reply {
        assert!(reply.len() <= REPLY_CAPACITY);
    }

    if parsed.is_err() {
        assert_eq!(node.calibration().block(), &before, "rejected input mutated state");
    }
    assert!(node.calibration().device(0).is_some_and(|d| d.is_calibrated()));
    assert!(decode_image(node.calibration().store().image()).is_ok());
});
