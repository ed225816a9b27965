#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio_mime_entity::{format_media_type, parse_media_type, parse_content_disposition};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(media_type) = parse_media_type(s) {
            let _ = parse_media_type(&format_media_type(&media_type));
        }
        let _ = parse_content_disposition(s);
    }
});
