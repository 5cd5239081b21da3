#![no_main]

use libfuzzer_sys::fuzz_target;
use vanikeys_core::Proof;

fuzz_target!(|data: &[u8]| {
    // Proofs arrive from the searcher; decoding must never panic.
    if let Ok(proof) = Proof::from_wire(data) {
        // Anything accepted re-encodes to exactly the input.
        assert_eq!(proof.to_wire(), data);
        let _ = proof.verify((&proof.commitment).into());
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Proof::from_json(s);
    }
});
