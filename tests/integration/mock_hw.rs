//! Mock adapters for integration tests.
//!
//! Records every port call so tests can assert on the full history
//! without touching real GPIO or flash.

use s0meter::app::events::{Report, ReportReason};
use s0meter::app::ports::{IndicatorPort, PersistentStore, PresencePort, ReportSink, StorageError};
use s0meter::app::service::MeteringNode;
use s0meter::calibration::CalibrationStore;
use s0meter::config::{CHANNEL_COUNT, IMAGE_SIZE};
use s0meter::sensors::pulse::PulseChannel;

// ── MockEeprom ────────────────────────────────────────────────

/// Byte-addressable store that counts commits and cell writes.
#[derive(Debug, Clone)]
pub struct MockEeprom {
    pub cells: [u8; IMAGE_SIZE],
    pub commits: u32,
    pub cell_writes: u32,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockEeprom {
    /// Erased memory (every cell `0xFF`).
    pub fn blank() -> Self {
        Self::with_image([0xFF; IMAGE_SIZE])
    }

    pub fn with_image(cells: [u8; IMAGE_SIZE]) -> Self {
        Self {
            cells,
            commits: 0,
            cell_writes: 0,
            fail_writes: false,
        }
    }
}

impl PersistentStore for MockEeprom {
    fn capacity(&self) -> usize {
        IMAGE_SIZE
    }

    fn read_byte(&self, offset: usize) -> u8 {
        self.cells.get(offset).copied().unwrap_or(0xFF)
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        let cell = self.cells.get_mut(offset).ok_or(StorageError::OutOfRange)?;
        *cell = value;
        self.cell_writes += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.commits += 1;
        Ok(())
    }
}

// ── MockBoard ─────────────────────────────────────────────────

/// Scriptable presence pins + recorded LED writes.
pub struct MockBoard {
    pub present: [bool; CHANNEL_COUNT],
    pub led_calls: Vec<(usize, bool)>,
}

#[allow(dead_code)]
impl MockBoard {
    /// Every slot fitted.
    pub fn new() -> Self {
        Self {
            present: [true; CHANNEL_COUNT],
            led_calls: Vec::new(),
        }
    }

    /// Last level driven on `channel`'s LED.
    pub fn led(&self, channel: usize) -> Option<bool> {
        self.led_calls
            .iter()
            .rev()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, lit)| *lit)
    }
}

impl PresencePort for MockBoard {
    fn is_present(&self, channel: usize) -> bool {
        self.present.get(channel).copied().unwrap_or(false)
    }
}

impl IndicatorPort for MockBoard {
    fn set_indicator(&mut self, channel: usize, lit: bool) {
        self.led_calls.push((channel, lit));
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub reports: Vec<Report>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
        }
    }

    pub fn for_channel(&self, channel: u8) -> Vec<Report> {
        self.reports
            .iter()
            .filter(|r| r.channel == channel)
            .copied()
            .collect()
    }

    pub fn last_for(&self, channel: u8) -> Option<Report> {
        self.for_channel(channel).last().copied()
    }

    pub fn count(&self, channel: u8, reason: ReportReason) -> usize {
        self.reports
            .iter()
            .filter(|r| r.channel == channel && r.reason == reason)
            .count()
    }
}

impl ReportSink for RecordingSink {
    fn report(&mut self, report: &Report) {
        self.reports.push(*report);
    }
}

// ── Node fixture ──────────────────────────────────────────────

/// Load `eeprom` and build a node over `channels`, started at `now_ms`.
#[allow(dead_code)]
pub fn boot_with(
    eeprom: MockEeprom,
    channels: &[PulseChannel; CHANNEL_COUNT],
    now_ms: u32,
) -> MeteringNode<'_, MockEeprom> {
    MeteringNode::new(CalibrationStore::load(eeprom), channels, now_ms)
}

/// Factory-fresh node at t = 0.
#[allow(dead_code)]
pub fn boot(channels: &[PulseChannel; CHANNEL_COUNT]) -> MeteringNode<'_, MockEeprom> {
    boot_with(MockEeprom::blank(), channels, 0)
}
