//! Durable calibration store.
//!
//! Owns the single [`CalibrationBlock`] (global report policy + one
//! [`Device`] per channel) and mediates every read and update against the
//! [`PersistentStore`] port.
//!
//! # Image layout
//!
//! ```text
//! offset  size  content
//! 0       4     magic  b"PWI\0"
//! 4       1     format version
//! 5       2     payload length (u16 LE)
//! 7       ≤245  postcard { ReportPolicy, [Device; 4] }
//! ...           zero padding
//! 252     4     CRC-32 (IEEE, LE) over bytes 0..252
//! ```
//!
//! # Write endurance
//!
//! The image is rewritten only by [`CalibrationStore::factory_reset`] and by
//! the explicit mutation entry points.  Nothing here runs on a timer.
//! Cells that already hold the target byte are skipped.

use core::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{PersistentStore, StorageError};
use crate::config::{IMAGE_SIZE, ReportPolicy};
use crate::device::{Device, DeviceRegistry, is_valid_label, truncated_name};

/// Marker distinguishing an initialized image from blank or foreign memory.
pub const MAGIC: [u8; 4] = *b"PWI\0";
/// Current image format.
pub const FORMAT_VERSION: u8 = 1;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_LEN: usize = 5;
const OFF_PAYLOAD: usize = 7;
const OFF_CRC: usize = IMAGE_SIZE - 4;
const PAYLOAD_CAPACITY: usize = OFF_CRC - OFF_PAYLOAD;

// ═══════════════════════════════════════════════════════════════
//  Block + image codec
// ═══════════════════════════════════════════════════════════════

/// Everything that survives a power cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationBlock {
    pub policy: ReportPolicy,
    pub devices: DeviceRegistry,
}

impl CalibrationBlock {
    /// Factory defaults: default policy, every channel a DRS155-D at 0 Wh.
    pub fn factory() -> Self {
        Self {
            policy: ReportPolicy::default(),
            devices: DeviceRegistry::factory(),
        }
    }
}

impl Default for CalibrationBlock {
    fn default() -> Self {
        Self::factory()
    }
}

/// Reasons an image cannot be decoded.  All of them are treated as
/// corruption by [`CalibrationStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    BadMagic,
    UnsupportedVersion(u8),
    BadLength(u16),
    CrcMismatch { stored: u32, computed: u32 },
    Decode,
    /// Block does not fit the payload area.
    Encode,
    InvalidPolicy(&'static str),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "magic marker mismatch"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported format version {v}"),
            Self::BadLength(len) => write!(f, "payload length {len} out of range"),
            Self::CrcMismatch { stored, computed } => {
                write!(f, "CRC mismatch (stored={stored:#010x}, computed={computed:#010x})")
            }
            Self::Decode => write!(f, "payload decode failed"),
            Self::Encode => write!(f, "block exceeds payload capacity"),
            Self::InvalidPolicy(msg) => write!(f, "invalid policy: {msg}"),
        }
    }
}

/// Serialize `block` into a full image.
pub fn encode_image(block: &CalibrationBlock) -> Result<[u8; IMAGE_SIZE], ImageError> {
    let mut out = [0u8; IMAGE_SIZE];
    out[OFF_MAGIC..OFF_VERSION].copy_from_slice(&MAGIC);
    out[OFF_VERSION] = FORMAT_VERSION;

    let len = postcard::to_slice(block, &mut out[OFF_PAYLOAD..OFF_CRC])
        .map_err(|_| ImageError::Encode)?
        .len();
    out[OFF_LEN..OFF_PAYLOAD].copy_from_slice(&(len as u16).to_le_bytes());

    let crc = crc32_ieee(&out[..OFF_CRC]);
    out[OFF_CRC..].copy_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Validate and deserialize a full image.
pub fn decode_image(bytes: &[u8; IMAGE_SIZE]) -> Result<CalibrationBlock, ImageError> {
    if bytes[OFF_MAGIC..OFF_VERSION] != MAGIC {
        return Err(ImageError::BadMagic);
    }
    let version = bytes[OFF_VERSION];
    if version != FORMAT_VERSION {
        return Err(ImageError::UnsupportedVersion(version));
    }
    let len = u16::from_le_bytes([bytes[OFF_LEN], bytes[OFF_LEN + 1]]);
    if len == 0 || usize::from(len) > PAYLOAD_CAPACITY {
        return Err(ImageError::BadLength(len));
    }

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&bytes[OFF_CRC..]);
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = crc32_ieee(&bytes[..OFF_CRC]);
    if stored != computed {
        return Err(ImageError::CrcMismatch { stored, computed });
    }

    let payload = &bytes[OFF_PAYLOAD..OFF_PAYLOAD + usize::from(len)];
    let block: CalibrationBlock = postcard::from_bytes(payload).map_err(|_| ImageError::Decode)?;
    block.policy.validate().map_err(ImageError::InvalidPolicy)?;
    Ok(block)
}

/// Bitwise CRC-32 (IEEE 802.3, reflected, init/xorout `0xFFFF_FFFF`).
pub fn crc32_ieee(bytes: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &b in bytes {
        crc ^= u32::from(b);
        for _ in 0..8 {
            let mask = 0u32.wrapping_sub(crc & 1);
            crc = (crc >> 1) ^ (0xEDB8_8320u32 & mask);
        }
    }
    !crc
}

// ═══════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════

/// Errors from calibration mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// Channel index outside the registry.
    UnknownChannel(usize),
    /// A field failed validation.  Memory and store are unchanged.
    Invalid(&'static str),
    /// Memory was updated but the image could not be written.
    Storage(StorageError),
    /// The block could not be encoded.
    Image(ImageError),
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChannel(ch) => write!(f, "unknown channel {ch}"),
            Self::Invalid(msg) => write!(f, "invalid value: {msg}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Image(e) => write!(f, "image: {e}"),
        }
    }
}

impl From<StorageError> for CalibrationError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ImageError> for CalibrationError {
    fn from(e: ImageError) -> Self {
        Self::Image(e)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Store
// ═══════════════════════════════════════════════════════════════

/// Where the in-memory block came from at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    /// A valid image was found.
    Stored,
    /// The image was blank or corrupt; factory defaults were written.
    FactoryReset,
}

/// Owner of the calibration block and its backing store.
pub struct CalibrationStore<S: PersistentStore> {
    store: S,
    block: CalibrationBlock,
    origin: ImageOrigin,
    persist_count: u32,
}

impl<S: PersistentStore> CalibrationStore<S> {
    /// Read the image byte by byte.  A blank or corrupt image is replaced
    /// by factory defaults, which are persisted immediately.
    pub fn load(store: S) -> Self {
        let mut image = [0u8; IMAGE_SIZE];
        for (offset, byte) in image.iter_mut().enumerate() {
            *byte = store.read_byte(offset);
        }

        match decode_image(&image) {
            Ok(block) => {
                info!("Calibration: loaded image v{}", FORMAT_VERSION);
                Self {
                    store,
                    block,
                    origin: ImageOrigin::Stored,
                    persist_count: 0,
                }
            }
            Err(e) => {
                warn!("Calibration: {}, restoring factory defaults", e);
                let mut this = Self {
                    store,
                    block: CalibrationBlock::factory(),
                    origin: ImageOrigin::FactoryReset,
                    persist_count: 0,
                };
                this.factory_reset();
                this
            }
        }
    }

    /// Replace the block with factory defaults and persist it.
    ///
    /// A failed write is logged; the node keeps running on the in-memory
    /// defaults.
    pub fn factory_reset(&mut self) {
        info!("Calibration: factory reset");
        self.block = CalibrationBlock::factory();
        if let Err(e) = self.persist() {
            warn!("Calibration: factory image not persisted: {}", e);
        }
    }

    /// Write the whole block back to the store and commit once.
    pub fn persist(&mut self) -> Result<(), CalibrationError> {
        let image = encode_image(&self.block)?;
        if self.store.capacity() < IMAGE_SIZE {
            return Err(CalibrationError::Storage(StorageError::OutOfRange));
        }

        let mut rewritten = 0usize;
        for (offset, &byte) in image.iter().enumerate() {
            if self.store.read_byte(offset) != byte {
                self.store.write_byte(offset, byte)?;
                rewritten += 1;
            }
        }
        self.store.commit()?;
        self.persist_count = self.persist_count.wrapping_add(1);
        debug!("Calibration: persisted ({} cells rewritten)", rewritten);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn block(&self) -> &CalibrationBlock {
        &self.block
    }

    pub fn policy(&self) -> &ReportPolicy {
        &self.block.policy
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.block.devices
    }

    pub fn device(&self, channel: usize) -> Option<&Device> {
        self.block.devices.get(channel)
    }

    /// In-memory access for the energy counter.  Changes made here are not
    /// persisted until the next explicit [`persist`](Self::persist).
    pub(crate) fn device_mut(&mut self, channel: usize) -> Option<&mut Device> {
        self.block.devices.get_mut(channel)
    }

    pub fn origin(&self) -> ImageOrigin {
        self.origin
    }

    /// Number of successful persists since boot (one per store commit).
    pub fn persist_count(&self) -> u32 {
        self.persist_count
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Field mutation (validate → update → persist) ──────────

    pub fn set_pulses_per_kwh(&mut self, channel: usize, value: u16) -> Result<(), CalibrationError> {
        if value == 0 {
            return Err(CalibrationError::Invalid("pulses_per_kwh must be > 0"));
        }
        self.device_or_err(channel)?.pulses_per_kwh = value;
        info!("Calibration: ch{} pulses_per_kwh={}", channel, value);
        self.persist()
    }

    pub fn set_min_pulse_width(&mut self, channel: usize, value: u16) -> Result<(), CalibrationError> {
        if value == 0 {
            return Err(CalibrationError::Invalid("min_pulse_width_ms must be > 0"));
        }
        self.device_or_err(channel)?.min_pulse_width_ms = value;
        info!("Calibration: ch{} min_pulse_width_ms={}", channel, value);
        self.persist()
    }

    pub fn set_model_name(&mut self, channel: usize, label: &str) -> Result<(), CalibrationError> {
        if !is_valid_label(label) {
            return Err(CalibrationError::Invalid("model_name must be printable ASCII"));
        }
        let device = self.device_or_err(channel)?;
        device.model_name = truncated_name(label);
        info!("Calibration: ch{} model_name='{}'", channel, device.model_name);
        self.persist()
    }

    /// Update all three calibration fields of one channel with a single
    /// persist.  Either every value is accepted or nothing changes.
    pub fn set_device(
        &mut self,
        channel: usize,
        pulses_per_kwh: u16,
        min_pulse_width_ms: u16,
        label: &str,
    ) -> Result<(), CalibrationError> {
        if pulses_per_kwh == 0 {
            return Err(CalibrationError::Invalid("pulses_per_kwh must be > 0"));
        }
        if min_pulse_width_ms == 0 {
            return Err(CalibrationError::Invalid("min_pulse_width_ms must be > 0"));
        }
        if !is_valid_label(label) {
            return Err(CalibrationError::Invalid("model_name must be printable ASCII"));
        }
        let device = self.device_or_err(channel)?;
        device.pulses_per_kwh = pulses_per_kwh;
        device.min_pulse_width_ms = min_pulse_width_ms;
        device.model_name = truncated_name(label);
        info!(
            "Calibration: ch{} set {} imp/kWh, {} ms, '{}'",
            channel, pulses_per_kwh, min_pulse_width_ms, device.model_name
        );
        self.persist()
    }

    /// Change the global report interval bounds.
    pub fn set_report_intervals(&mut self, min_ms: u32, max_ms: u32) -> Result<(), CalibrationError> {
        let policy = ReportPolicy {
            min_report_interval_ms: min_ms,
            max_report_interval_ms: max_ms,
            ..self.block.policy
        };
        policy.validate().map_err(CalibrationError::Invalid)?;
        self.block.policy = policy;
        info!("Calibration: report intervals {}..{} ms", min_ms, max_ms);
        self.persist()
    }

    /// Change the auto-save interval (0 disables auto-save).
    pub fn set_auto_save_interval(&mut self, interval_ms: u32) -> Result<(), CalibrationError> {
        self.block.policy.auto_save_interval_ms = interval_ms;
        info!("Calibration: auto-save interval {} ms", interval_ms);
        self.persist()
    }

    fn device_or_err(&mut self, channel: usize) -> Result<&mut Device, CalibrationError> {
        self.block
            .devices
            .get_mut(channel)
            .ok_or(CalibrationError::UnknownChannel(channel))
    }

    // ── Diagnostics ───────────────────────────────────────────

    /// Log every persisted field.
    pub fn dump(&self) {
        let p = &self.block.policy;
        info!(
            "[calibration] magic={:?} version={} origin={:?} persists={}",
            core::str::from_utf8(&MAGIC[..3]).unwrap_or("?"),
            FORMAT_VERSION,
            self.origin,
            self.persist_count
        );
        info!(
            "[calibration] min_report_interval_ms={} max_report_interval_ms={} \
             auto_save_interval_ms={} auto_dump_interval_ms={}",
            p.min_report_interval_ms,
            p.max_report_interval_ms,
            p.auto_save_interval_ms,
            p.auto_dump_interval_ms
        );
        for (ch, d) in self.block.devices.iter().enumerate() {
            info!(
                "[calibration] device #{}: {} imp/kWh, {} ms/imp, {} Wh, name='{}'",
                ch, d.pulses_per_kwh, d.min_pulse_width_ms, d.cumulative_energy_wh, d.model_name
            );
        }
    }
}
