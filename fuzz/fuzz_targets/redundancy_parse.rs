#![no_main]
use common::ZoneRedundancy;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(redundancy) = text.parse::<ZoneRedundancy>() {
        let canonical = match redundancy {
            ZoneRedundancy::Maximum => "maximum".to_string(),
            ZoneRedundancy::AtLeast(n) => n.to_string(),
        };
        assert_eq!(canonical.parse::<ZoneRedundancy>().ok(), Some(redundancy));
        let _ = redundancy.to_string();
    }
});
