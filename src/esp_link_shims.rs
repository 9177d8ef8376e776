//! ESP-IDF runtime symbol providers for third-party crates.
//!
//! `embassy-sync`'s `CriticalSectionRawMutex` links against the
//! `critical-section` 1.x acquire/release symbols.  The pulse channels are
//! locked from both the GPIO ISR and the main task, so the section is a
//! FreeRTOS port spinlock (interrupts masked on the current core), which
//! is valid in either context and nests.

#[cfg(target_os = "espidf")]
use core::cell::UnsafeCell;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{portMUX_TYPE, vPortEnterCritical, vPortExitCritical};

#[cfg(target_os = "espidf")]
struct PortMux(UnsafeCell<portMUX_TYPE>);

// SAFETY: the spinlock is only touched through vPortEnter/ExitCritical,
// which serialise access across cores.
#[cfg(target_os = "espidf")]
unsafe impl Sync for PortMux {}

#[cfg(target_os = "espidf")]
static CRITICAL_SECTION_MUX: PortMux = PortMux(UnsafeCell::new(portMUX_TYPE {
    owner: esp_idf_svc::sys::SPINLOCK_FREE,
    count: 0,
}));

/// Runtime-backed critical-section acquire used by `critical-section` 1.x.
#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    // SAFETY: the mux is a valid, statically allocated port spinlock.
    unsafe { vPortEnterCritical(CRITICAL_SECTION_MUX.0.get()) };
    0
}

/// Runtime-backed critical-section release used by `critical-section` 1.x.
#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    // SAFETY: paired with the acquire above on the same core.
    unsafe { vPortExitCritical(CRITICAL_SECTION_MUX.0.get()) };
}
