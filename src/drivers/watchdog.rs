//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the node if the poll loop stalls for longer than the timeout.
//!
//! The poll loop calls [`Watchdog::feed`] once per iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

/// Default stall limit.
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: u32,
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn subscribe(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls on the current task handle (null).
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({} ms, panic on trigger)", timeout_ms);
                } else {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }
                Self {
                    timeout_ms,
                    subscribed,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): {} ms, no-op", timeout_ms);
            Self {
                timeout_ms,
                feeds: 0,
            }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Feed the watchdog.  Must be called at least once per timeout.
    #[cfg(target_os = "espidf")]
    pub fn feed(&mut self) {
        if self.subscribed {
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);
    }

    /// Feeds so far (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u32 {
        self.feeds
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::subscribe(DEFAULT_TIMEOUT_MS)
    }
}
