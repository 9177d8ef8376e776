//! Inbound commands to the metering node.
//!
//! Two kinds of input reach the [`MeteringNode`](super::service::MeteringNode):
//!
//! - [`AppCommand`]: typed maintenance requests from local code (button,
//!   serial console, timers).
//! - Remote configuration text, parsed by [`ConfigCommand::parse`]:
//!
//! | Payload            | Meaning                                   |
//! |--------------------|-------------------------------------------|
//! | `1` / `1=<u16>`    | query / set pulses per kWh                |
//! | `2` / `2=<u16>`    | query / set minimum pulse width (ms)      |
//! | `3` / `3=<label>`  | query / set model name                    |
//! | `4` / `4=<p>,<w>,<label>` | query / set all three at once      |
//!
//! Numbers must be non-zero.  Labels are printable ASCII with surrounding
//! whitespace trimmed; anything longer than the model-name capacity is
//! truncated when stored.

use core::fmt::{self, Write};

use heapless::String;

use crate::device::{Device, is_valid_label};

/// Maintenance requests that do not come in as remote text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Realize pending pulses on every channel and persist the counters.
    SaveEnergy,
    /// Restore factory calibration and zero every counter.
    FactoryReset,
    /// Change the global min/max report intervals.
    SetReportIntervals { min_ms: u32, max_ms: u32 },
    /// Change the auto-save interval; `0` disables auto-save.
    SetAutoSaveInterval(u32),
    /// Log the persisted calibration and per-channel runtime state.
    DumpCalibration,
}

// ═══════════════════════════════════════════════════════════════
//  Remote configuration
// ═══════════════════════════════════════════════════════════════

/// Addressable calibration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PulsesPerKwh,
    MinPulseWidth,
    ModelName,
    All,
}

impl Field {
    fn from_id(id: &str) -> Option<Self> {
        match id {
            "1" => Some(Self::PulsesPerKwh),
            "2" => Some(Self::MinPulseWidth),
            "3" => Some(Self::ModelName),
            "4" => Some(Self::All),
            _ => None,
        }
    }
}

/// A parsed remote configuration request.  Borrowed from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand<'a> {
    Query(Field),
    SetPulsesPerKwh(u16),
    SetMinPulseWidth(u16),
    SetModelName(&'a str),
    SetAll {
        pulses_per_kwh: u16,
        min_pulse_width_ms: u16,
        model_name: &'a str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    UnknownField,
    BadNumber,
    ZeroValue,
    BadLabel,
    /// Field 4 needs exactly `<p>,<w>,<label>`.
    MissingPart,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty payload"),
            Self::UnknownField => write!(f, "unknown field id"),
            Self::BadNumber => write!(f, "value is not a 16-bit number"),
            Self::ZeroValue => write!(f, "value must be non-zero"),
            Self::BadLabel => write!(f, "label must be printable ASCII"),
            Self::MissingPart => write!(f, "expected <pulses>,<width>,<label>"),
        }
    }
}

impl<'a> ConfigCommand<'a> {
    pub fn parse(payload: &'a str) -> Result<Self, CommandError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(CommandError::Empty);
        }

        let (id, value) = match payload.split_once('=') {
            Some((id, value)) => (id.trim(), Some(value)),
            None => (payload, None),
        };
        let field = Field::from_id(id).ok_or(CommandError::UnknownField)?;
        let Some(value) = value else {
            return Ok(Self::Query(field));
        };

        match field {
            Field::PulsesPerKwh => Ok(Self::SetPulsesPerKwh(parse_nonzero(value)?)),
            Field::MinPulseWidth => Ok(Self::SetMinPulseWidth(parse_nonzero(value)?)),
            Field::ModelName => Ok(Self::SetModelName(parse_label(value)?)),
            Field::All => {
                let mut parts = value.splitn(3, ',');
                let pulses = parts.next().ok_or(CommandError::MissingPart)?;
                let width = parts.next().ok_or(CommandError::MissingPart)?;
                let label = parts.next().ok_or(CommandError::MissingPart)?;
                Ok(Self::SetAll {
                    pulses_per_kwh: parse_nonzero(pulses)?,
                    min_pulse_width_ms: parse_nonzero(width)?,
                    model_name: parse_label(label)?,
                })
            }
        }
    }
}

fn parse_nonzero(value: &str) -> Result<u16, CommandError> {
    let n: u16 = value.trim().parse().map_err(|_| CommandError::BadNumber)?;
    if n == 0 {
        return Err(CommandError::ZeroValue);
    }
    Ok(n)
}

fn parse_label(value: &str) -> Result<&str, CommandError> {
    let value = value.trim();
    if is_valid_label(value) {
        Ok(value)
    } else {
        Err(CommandError::BadLabel)
    }
}

// ── Replies ───────────────────────────────────────────────────

/// Room for `"65535,65535,"` plus a full model name.
pub const REPLY_CAPACITY: usize = 40;

pub type Reply = String<REPLY_CAPACITY>;

/// Render the queried field of `device`.
pub fn format_reply(field: Field, device: &Device) -> Reply {
    let mut out = Reply::new();
    // Capacity covers the longest possible rendering.
    let _ = match field {
        Field::PulsesPerKwh => write!(out, "{}", device.pulses_per_kwh),
        Field::MinPulseWidth => write!(out, "{}", device.min_pulse_width_ms),
        Field::ModelName => write!(out, "{}", device.model_name),
        Field::All => write!(
            out,
            "{},{},{}",
            device.pulses_per_kwh, device.min_pulse_width_ms, device.model_name
        ),
    };
    out
}
