#![no_main]

use fc_types::{Scalar, parse_number};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let value = parse_number(text);
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        let rendered = Scalar::Float64(value).to_text();
        assert_eq!(parse_number(&rendered), value);
    }
});
