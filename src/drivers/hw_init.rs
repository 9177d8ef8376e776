//! One-shot GPIO initialization for the meter slots.
//!
//! Configures every channel's pulse input (pull-up, falling-edge
//! interrupt), presence input and status LED output using raw ESP-IDF sys
//! calls.  Called once from `main()` before the poll loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins::CHANNEL_PINS;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed { pin: i32, rc: i32 },
    IsrInstallFailed(i32),
    IsrHandlerFailed { pin: i32, rc: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed { pin, rc } => {
                write!(f, "GPIO{} config failed (rc={})", pin, rc)
            }
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrHandlerFailed { pin, rc } => {
                write!(f, "GPIO{} ISR handler add failed (rc={})", pin, rc)
            }
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the poll loop; single-threaded.
    unsafe {
        init_gpio_inputs()?;
        init_gpio_outputs()?;
    }
    info!("hw_init: {} meter slots configured", CHANNEL_PINS.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn config_pin(pin: i32, mode: gpio_mode_t, pull_up: bool, intr: gpio_int_type_t) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: intr,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed { pin, rc: ret });
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    for p in &CHANNEL_PINS {
        // S0 outputs are open collector: pull-up, count the falling edge.
        unsafe {
            config_pin(p.input, gpio_mode_t_GPIO_MODE_INPUT, true, gpio_int_type_t_GPIO_INTR_NEGEDGE)?;
            config_pin(p.presence, gpio_mode_t_GPIO_MODE_INPUT, false, gpio_int_type_t_GPIO_INTR_DISABLE)?;
        }
    }
    info!("hw_init: pulse and presence inputs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulation: every slot reads as fitted.
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for p in &CHANNEL_PINS {
        unsafe {
            config_pin(p.led, gpio_mode_t_GPIO_MODE_OUTPUT, false, gpio_int_type_t_GPIO_INTR_DISABLE)?;
            gpio_set_level(p.led, 0);
        }
    }
    info!("hw_init: status LEDs configured");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}
