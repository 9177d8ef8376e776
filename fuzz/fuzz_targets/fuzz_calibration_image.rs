//! Fuzz target: boot-time image decoding.
//!
//! Loads arbitrary memory contents.  Whatever the bytes, the store must
//! come up with a valid policy and, if it fell back to factory defaults,
//! leave a decodable image behind.
//!
//! cargo fuzz run fuzz_calibration_image

#![no_main]

use libfuzzer_sys::fuzz_target;
use s0meter::adapters::eeprom::EepromAdapter;
use s0meter::calibration::{CalibrationBlock, CalibrationStore, ImageOrigin, decode_image};
use s0meter::config::IMAGE_SIZE;

fuzz_target!(|data: &[u8]| {
    let mut image = [0xFFu8; IMAGE_SIZE];
    let n = data.len().min(IMAGE_SIZE);
    image[..n].copy_from_slice(&data[..n]);

    let direct = decode_image(&image);
    let cal = CalibrationStore::load(EepromAdapter::from_image(image));

    assert!(cal.policy().validate().is_ok());
    match cal.origin() {
        ImageOrigin::Stored => assert_eq!(direct.ok().as_ref(), Some(cal.block())),
        ImageOrigin::FactoryReset => {
            assert!(direct.is_err());
            assert_eq!(cal.block(), &CalibrationBlock::factory());
            assert!(decode_image(cal.store().image()).is_ok());
        }
    }
});
