//! S0 pulse interrupt wiring.
//!
//! Registers one falling-edge GPIO ISR per meter slot.  The handler
//! argument is the slot's `&'static PulseChannel`, so no global lookup
//! table is needed: the ISR reads the clock and calls
//! [`PulseChannel::on_edge`](crate::sensors::pulse::PulseChannel::on_edge).

use crate::config::CHANNEL_COUNT;
use crate::sensors::pulse::PulseChannel;

use super::hw_init::HwInitError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins::CHANNEL_PINS;

/// GPIO ISR trampoline.
///
/// # Safety
///
/// `arg` must be the address of a `PulseChannel` that outlives the
/// registration (guaranteed by the `'static` bound in [`attach`]).
#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".iram1.pulse_isr")]
unsafe extern "C" fn pulse_gpio_isr(arg: *mut core::ffi::c_void) {
    let channel = unsafe { &*(arg as *const PulseChannel) };
    // esp_timer_get_time is ISR-safe.  The u32 ms clock wraps after ~49.7 days.
    let now_ms = (unsafe { esp_timer_get_time() } / 1000) as u32;
    channel.on_edge(now_ms);
}

/// Install the GPIO ISR service and hook every slot's pulse input.
#[cfg(target_os = "espidf")]
pub fn attach(channels: &'static [PulseChannel; CHANNEL_COUNT]) -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handler argument points into a
    // 'static array.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        for (pins, channel) in CHANNEL_PINS.iter().zip(channels.iter()) {
            gpio_set_intr_type(pins.input, gpio_int_type_t_GPIO_INTR_NEGEDGE);
            let arg = channel as *const PulseChannel as *mut core::ffi::c_void;
            let ret = gpio_isr_handler_add(pins.input, Some(pulse_gpio_isr), arg);
            if ret != ESP_OK {
                return Err(HwInitError::IsrHandlerFailed {
                    pin: pins.input,
                    rc: ret,
                });
            }
            gpio_intr_enable(pins.input);
        }
    }
    info!("pulse_input: {} falling-edge ISRs attached", CHANNEL_COUNT);
    Ok(())
}

/// Simulation: edges are injected by calling `on_edge` directly.
#[cfg(not(target_os = "espidf"))]
pub fn attach(_channels: &'static [PulseChannel; CHANNEL_COUNT]) -> Result<(), HwInitError> {
    log::info!("pulse_input(sim): ISR registration skipped");
    Ok(())
}
