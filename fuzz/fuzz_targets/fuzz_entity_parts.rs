#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio::runtime::Builder;
use tokio_mime_entity::{ByteSource, Entity};

fuzz_target!(|data: &[u8]| {
    let rt = Builder::new_current_thread().enable_all().build().unwrap();
    let data = data.to_vec();

    rt.block_on(async {
        let mut entity = Entity::new();
        if entity
            .set_byte_source(ByteSource::from_bytes(data), Some("multipart/mixed; boundary=b"))
            .is_err()
        {
            return;
        }
        if entity.parts().await.is_err() {
            return;
        }
        if entity.encode_parts().await.is_ok() {
            let _ = entity.parts().await;
        }
    });
});
