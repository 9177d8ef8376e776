//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                   | Connects to               |
//! |------------|------------------------------|---------------------------|
//! | `console`  | (inbound requests)           | UART console lines        |
//! | `eeprom`   | PersistentStore              | NVS blob / in-memory      |
//! | `hardware` | PresencePort, IndicatorPort  | Meter-slot GPIOs          |
//! | `log_sink` | ReportSink                   | Serial log output         |
//! | `time`     | Clock                        | ESP32 system timer        |

pub mod console;
pub mod eeprom;
pub mod hardware;
pub mod log_sink;
pub mod time;
