//! Serial console command adapter.
//!
//! Lines typed on the UART console are turned into node requests:
//!
//! | Line                    | Request                                   |
//! |-------------------------|-------------------------------------------|
//! | `<ch>:<payload>`        | remote configuration for channel `<ch>`   |
//! | `save`                  | [`AppCommand::SaveEnergy`]                |
//! | `reset`                 | [`AppCommand::FactoryReset`]              |
//! | `dump`                  | [`AppCommand::DumpCalibration`]           |
//! | `intervals <min> <max>` | [`AppCommand::SetReportIntervals`]        |
//! | `autosave <ms>`         | [`AppCommand::SetAutoSaveInterval`]       |
//!
//! Stdin is read on a dedicated thread.  Lines reach the poll loop through
//! a static bounded channel, drained with [`try_recv_line`]; overlong lines
//! and lines arriving while the queue is full are dropped with a warning.
//!
//! ```text
//! ┌──────────────┐  CONSOLE_CHANNEL  ┌──────────────┐
//! │ stdin thread │──────────────────▶│  Poll loop   │
//! └──────────────┘   ConsoleLine     └──────────────┘
//! ```

use std::io::BufRead;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::AppCommand;

/// Longest accepted console line, in bytes.
pub const LINE_CAPACITY: usize = 64;

/// Lines buffered between the reader thread and the poll loop.
const CONSOLE_DEPTH: usize = 8;

pub type ConsoleLine = heapless::String<LINE_CAPACITY>;

/// Inbound console lines: reader thread → poll loop.
pub static CONSOLE_CHANNEL: Channel<CriticalSectionRawMutex, ConsoleLine, CONSOLE_DEPTH> =
    Channel::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleRequest<'a> {
    Remote { channel: usize, payload: &'a str },
    Command(AppCommand),
}

/// Parse one console line.  Unrecognised input yields `None`.
pub fn parse_line(line: &str) -> Option<ConsoleRequest<'_>> {
    let line = line.trim();
    if let Some((ch, payload)) = line.split_once(':') {
        let channel = ch.trim().parse().ok()?;
        return Some(ConsoleRequest::Remote { channel, payload });
    }

    let mut words = line.split_whitespace();
    let cmd = match words.next()? {
        "save" => AppCommand::SaveEnergy,
        "reset" => AppCommand::FactoryReset,
        "dump" => AppCommand::DumpCalibration,
        "intervals" => AppCommand::SetReportIntervals {
            min_ms: words.next()?.parse().ok()?,
            max_ms: words.next()?.parse().ok()?,
        },
        "autosave" => AppCommand::SetAutoSaveInterval(words.next()?.parse().ok()?),
        _ => return None,
    };
    if words.next().is_some() {
        return None;
    }
    Some(ConsoleRequest::Command(cmd))
}

// ── Channel accessors ─────────────────────────────────────────

/// Queue one line for the poll loop.  Returns `false` if it was dropped.
pub fn push_line(line: &str) -> bool {
    let mut buf = ConsoleLine::new();
    if buf.push_str(line.trim_end()).is_err() {
        warn!("console: line longer than {} bytes, dropping", LINE_CAPACITY);
        return false;
    }
    if CONSOLE_CHANNEL.try_send(buf).is_err() {
        warn!("console: queue full, dropping line");
        return false;
    }
    true
}

/// Next queued line, if any.  Never blocks.
pub fn try_recv_line() -> Option<ConsoleLine> {
    CONSOLE_CHANNEL.try_receive().ok()
}

/// Start the stdin reader thread feeding [`CONSOLE_CHANNEL`].
pub fn spawn_stdin_reader() {
    let spawned = std::thread::Builder::new()
        .name("console".into())
        .stack_size(4096)
        .spawn(|| {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        push_line(&line);
                    }
                    Err(e) => {
                        warn!("console: read error {}", e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!("console: reader thread not started: {}", e);
    }
}
