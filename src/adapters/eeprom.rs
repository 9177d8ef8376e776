//! Emulated EEPROM over NVS.
//!
//! Implements [`PersistentStore`] as a 256-byte shadow buffer.  Byte
//! writes only touch the shadow; [`commit`](PersistentStore::commit) flushes
//! it as a single NVS blob, so one persist costs one flash write no matter
//! how many cells changed.
//!
//! - **`target_os = "espidf"`**: the shadow is loaded from the
//!   `s0meter/calib` blob at construction.  A missing blob reads as erased
//!   (`0xFF`) memory, which the calibration loader treats as blank.
//! - **`not(target_os = "espidf")`**: purely in memory, with commit and
//!   cell-write counters for endurance checks in tests.

use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{PersistentStore, StorageError};
use crate::config::IMAGE_SIZE;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"s0meter\0";
#[cfg(target_os = "espidf")]
const BLOB_KEY: &[u8] = b"calib\0";

const ERASED: u8 = 0xFF;

pub struct EepromAdapter {
    shadow: [u8; IMAGE_SIZE],
    dirty: bool,
    commits: u32,
    cell_writes: u32,
}

impl EepromAdapter {
    /// Initialise NVS and load the stored image into the shadow buffer.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, StorageError> {
        // SAFETY: called once from the main task before any other NVS user.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("EEPROM: erasing and re-initialising NVS partition");
            if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                return Err(StorageError::IoError);
            }
        } else if ret != ESP_OK {
            return Err(StorageError::IoError);
        }

        let mut shadow = [ERASED; IMAGE_SIZE];
        match with_nvs_handle(false, |handle| {
            let mut size = IMAGE_SIZE;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    BLOB_KEY.as_ptr() as *const _,
                    shadow.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        }) {
            Ok(size) => info!("EEPROM: loaded {} byte image from NVS", size),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => info!("EEPROM: no stored image"),
            Err(e) => {
                warn!("EEPROM: NVS read error {}, treating as blank", e);
                shadow = [ERASED; IMAGE_SIZE];
            }
        }

        Ok(Self {
            shadow,
            dirty: false,
            commits: 0,
            cell_writes: 0,
        })
    }

    /// Blank (erased) in-memory EEPROM.
    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, StorageError> {
        info!("EEPROM: simulation backend");
        Ok(Self::from_image([ERASED; IMAGE_SIZE]))
    }

    /// Pre-programmed in-memory EEPROM.
    #[cfg(not(target_os = "espidf"))]
    pub fn from_image(image: [u8; IMAGE_SIZE]) -> Self {
        Self {
            shadow: image,
            dirty: false,
            commits: 0,
            cell_writes: 0,
        }
    }

    /// Current cell contents.
    pub fn image(&self) -> &[u8; IMAGE_SIZE] {
        &self.shadow
    }

    /// Flushes that reached the medium.
    pub fn commits(&self) -> u32 {
        self.commits
    }

    /// Individual cells rewritten since construction.
    pub fn cell_writes(&self) -> u32 {
        self.cell_writes
    }

    #[cfg(target_os = "espidf")]
    fn flush(&mut self) -> Result<(), StorageError> {
        let shadow = &self.shadow;
        with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    BLOB_KEY.as_ptr() as *const _,
                    shadow.as_ptr() as *const _,
                    shadow.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("EEPROM: NVS write error {}", e);
            StorageError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Open the calibration namespace, run `f` with the handle, then close.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<T>(
    write: bool,
    f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
) -> Result<T, i32> {
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };
    let mut handle: nvs_handle_t = 0;
    let ret = unsafe { nvs_open(NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK {
        return Err(ret);
    }
    let result = f(handle);
    unsafe {
        nvs_close(handle);
    }
    result
}

impl PersistentStore for EepromAdapter {
    fn capacity(&self) -> usize {
        IMAGE_SIZE
    }

    fn read_byte(&self, offset: usize) -> u8 {
        self.shadow.get(offset).copied().unwrap_or(ERASED)
    }

    fn write_byte(&mut self, offset: usize, value: u8) -> Result<(), StorageError> {
        let cell = self.shadow.get_mut(offset).ok_or(StorageError::OutOfRange)?;
        if *cell != value {
            *cell = value;
            self.dirty = true;
            self.cell_writes = self.cell_writes.wrapping_add(1);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }
        self.flush()?;
        self.dirty = false;
        self.commits = self.commits.wrapping_add(1);
        Ok(())
    }
}
