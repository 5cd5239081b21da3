#![no_main]

use libfuzzer_sys::fuzz_target;
use vanikeys_core::{estimate, PatternSpec};

const TEXT: &str = "xK3vO0oLl1IiE3e5Ss8Bb+/aaaabbbbccccAAAAZZZZ";

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(spec) = PatternSpec::from_json(s) else {
        return;
    };

    let _ = estimate(&spec, 64);
    if let Ok(pattern) = spec.compile() {
        let result = pattern.match_text(TEXT);
        assert!((0.0..=1.0).contains(&result.score));
        assert_eq!(pattern.is_exact_match(TEXT), result.is_exact());
    }
});
