#![no_main]

use libfuzzer_sys::fuzz_target;
use vanikeys_core::encoding::{decode, fingerprint_key};
use vanikeys_core::Commitment;

fuzz_target!(|data: &[u8]| {
    if let Ok(commitment) = Commitment::from_bytes(data) {
        let _ = Commitment::from_bytes(&commitment.to_bytes());
        let _ = fingerprint_key(commitment.public_key());
    }

    // SSH-style key encoding
    let _ = decode(data);

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Commitment::from_hex(s);
    }
});
