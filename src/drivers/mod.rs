//! GPIO bring-up, pulse interrupt wiring and the task watchdog.

pub mod hw_init;
pub mod pulse_input;
pub mod watchdog;
