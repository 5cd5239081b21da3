#![no_main]

use libfuzzer_sys::fuzz_target;
use vanikeys_core::EncryptedSeed;

fuzz_target!(|data: &[u8]| {
    if let Ok(sealed) = EncryptedSeed::from_bytes(data) {
        assert_eq!(sealed.to_bytes(), data);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = EncryptedSeed::from_hex(s);
    }
});
