#![no_main]

use libfuzzer_sys::fuzz_target;
use modkit_query::cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Any token that decodes must survive a re-encode
        if let Ok(map) = cursor::decode(s) {
            let token = cursor::encode(&map).unwrap();
            assert_eq!(cursor::decode(&token).unwrap(), map);
        }
    }
});
