#![no_main]

use libfuzzer_sys::fuzz_target;
use modkit_query::RawParams;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = RawParams::from_query_str(s);
    }
});
