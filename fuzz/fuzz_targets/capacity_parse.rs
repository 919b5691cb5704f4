#![no_main]
use layout_engine::{format_bytes, Capacity};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(capacity) = text.parse::<Capacity>() {
        if let Ok(bytes) = capacity.to_bytes() {
            let _ = format_bytes(bytes);
            let _ = Capacity::from_bytes(bytes).to_bytes();
        }
    }
});
