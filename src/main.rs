//! S0Meter Firmware: Main Entry Point
//!
//! Hexagonal architecture around a single cooperative poll loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BoardAdapter        LogReportSink   EepromAdapter  Esp32Time  │
//! │  (Presence+Indicator)(ReportSink)    (NVS blob)     (Clock)    │
//! │  console (UART lines → remote config / maintenance commands)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            MeteringNode (pure logic)                   │    │
//! │  │  Energy · Scheduler · Indicator · CalibrationStore     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                           ▲                                    │
//! │  GPIO falling-edge ISR ───┘ PulseChannel (&'static, ×4)        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use s0meter::adapters::console::{self, ConsoleRequest};
use s0meter::adapters::eeprom::EepromAdapter;
use s0meter::adapters::hardware::BoardAdapter;
use s0meter::adapters::log_sink::LogReportSink;
use s0meter::adapters::time::Esp32TimeAdapter;
use s0meter::app::ports::Clock;
use s0meter::app::service::MeteringNode;
use s0meter::calibration::{CalibrationStore, ImageOrigin};
use s0meter::config::CHANNEL_COUNT;
use s0meter::drivers::{hw_init, pulse_input, watchdog::Watchdog};
use s0meter::error::Error;
use s0meter::sensors::pulse::PulseChannel;

/// Poll period of the main loop.
const POLL_INTERVAL_MS: u64 = 50;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  S0Meter v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Hardware peripherals ───────────────────────────────
    hw_init::init_peripherals().map_err(Error::from)?;
    let mut watchdog = Watchdog::default();
    let clock = Esp32TimeAdapter::new();

    // ── 3. Calibration image ──────────────────────────────────
    let eeprom = EepromAdapter::new().map_err(Error::from)?;
    let calibration = CalibrationStore::load(eeprom);
    if calibration.origin() == ImageOrigin::FactoryReset {
        warn!("Boot: calibration image was blank or corrupt, factory defaults in use");
    }
    calibration.dump();

    // ── 4. Pulse channels (shared with the GPIO ISR) ──────────
    let channels: &'static [PulseChannel; CHANNEL_COUNT] =
        Box::leak(Box::new(core::array::from_fn(|_| PulseChannel::new())));

    let mut node = MeteringNode::new(calibration, channels, clock.now_ms());
    if let Err(e) = pulse_input::attach(channels) {
        // Without ISRs nothing is counted, but TIMEOUT reports and remote
        // configuration still work.
        log::error!("Pulse ISR setup failed: {}", e);
    }

    let mut board = BoardAdapter::new();
    let mut sink = LogReportSink::new();
    console::spawn_stdin_reader();

    info!("System ready. Entering poll loop.");

    // ── 5. Poll loop ──────────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();

        while let Some(line) = console::try_recv_line() {
            match console::parse_line(&line) {
                Some(ConsoleRequest::Remote { channel, payload }) => {
                    if let Some(reply) = node.handle_remote(channel, payload) {
                        info!("CONFIG | ch{} | {}", channel, reply);
                    }
                }
                Some(ConsoleRequest::Command(cmd)) => {
                    if let Err(e) = node.handle_command(cmd, now_ms) {
                        warn!("Command {:?} failed: {}", cmd, e);
                    }
                }
                None => warn!("Console: unrecognised '{}'", line.trim()),
            }
        }

        node.poll(now_ms, &mut board, &mut sink);

        watchdog.feed();
        std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }
}
