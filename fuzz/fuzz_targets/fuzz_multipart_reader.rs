#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio::runtime::Builder;
use tokio_mime_entity::multipart::Reader;
use tokio_mime_entity::DecoderConfig;

fuzz_target!(|data: &[u8]| {
    let rt = Builder::new_current_thread().enable_all().build().unwrap();

    rt.block_on(async {
        // Small limits so spilling and header caps are exercised too
        let config = DecoderConfig::new()
            .memory_threshold(64)
            .max_header_size(1024)
            .max_headers(16);
        let mut reader = Reader::with_config(data, "boundary", config);

        // Try to read up to 100 parts to avoid infinite loops
        for _ in 0..100 {
            match reader.next_part().await {
                Ok(Some(part)) => {
                    let _ = part.body.read_all().await;
                }
                Ok(None) | Err(_) => break,
            }
        }
    });
});
