//! Integration tests for tokio_mime_entity

use bytes::Bytes;
use serde_json::json;
use std::io;
use tokio_mime_entity::*;

const BOUNDARY: &str = "e3a0b9ad7b4e7cdt";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The four-part body used across these tests: JSON, XML, text and binary.
fn four_part_body() -> String {
    format!(
        "--{b}\r\n\
Content-Type: application/json\r\n\
\r\n\
{{\"bodyPart\":\"jsonPart\"}}\r\n\
--{b}\r\n\
Content-Disposition: attachment; filename=\"file-01.xml\"\r\n\
Content-Type: application/xml\r\n\
\r\n\
<name>Ballerina xml file part</name>\r\n\
--{b}\r\n\
Content-Type: text/plain\r\n\
Content-Id: <text-part>\r\n\
\r\n\
Ballerina text body part\r\n\
--{b}\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
Ballerina binary file part\r\n\
--{b}--\r\n",
        b = BOUNDARY
    )
}

fn multipart_entity(body: impl Into<Bytes>) -> Entity {
    let mut entity = Entity::new();
    entity
        .set_byte_source(
            ByteSource::from_bytes(body),
            Some(&format!("multipart/mixed; boundary={BOUNDARY}")),
        )
        .unwrap();
    entity
}

#[tokio::test]
async fn test_decode_four_parts() {
    init_tracing();
    let mut entity = multipart_entity(four_part_body());

    let parts = entity.parts().await.unwrap();
    assert_eq!(parts.len(), 4);

    assert_eq!(parts[0].read_json().await.unwrap(), json!({"bodyPart": "jsonPart"}));

    assert_eq!(
        parts[1].content_disposition().unwrap().filename.as_deref(),
        Some("file-01.xml")
    );
    assert_eq!(
        parts[1].read_xml().await.unwrap(),
        "<name>Ballerina xml file part</name>"
    );

    assert_eq!(parts[2].content_id(), Some("text-part"));
    assert_eq!(parts[2].read_text().await.unwrap(), "Ballerina text body part");

    assert_eq!(
        parts[3].read_bytes().await.unwrap(),
        Bytes::from_static(b"Ballerina binary file part")
    );
}

#[tokio::test]
async fn test_decode_is_idempotent() {
    let mut entity = multipart_entity(four_part_body());

    let first = entity.parts().await.unwrap().as_ptr();
    assert_eq!(entity.body_kind(), BodyKind::PartList);
    let second = entity.parts().await.unwrap().as_ptr();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_materialization_is_one_shot() {
    let mut entity = multipart_entity(four_part_body());
    let parts = entity.parts().await.unwrap();

    let text = &mut parts[2];
    assert_eq!(text.read_text().await.unwrap(), "Ballerina text body part");
    assert!(!text.has_body());
    assert!(matches!(text.read_text().await, Err(Error::NoContent(_))));
}

#[tokio::test]
async fn test_non_composite_entity_is_rejected() {
    let mut entity = Entity::new();
    entity
        .set_byte_source(ByteSource::from_bytes("plain"), Some("text/plain"))
        .unwrap();

    let err = entity.parts().await.unwrap_err();
    assert!(err
        .to_string()
        .contains("Entity body is not a type of composite media type. Received content-type : text/plain"));
    assert_eq!(entity.body_kind(), BodyKind::ByteSource);
    assert_eq!(entity.read_text().await.unwrap(), "plain");
}

#[tokio::test]
async fn test_setters_are_mutually_exclusive() {
    let mut entity = Entity::new();
    entity.set_text("text", None).unwrap();
    assert_eq!(entity.body_kind(), BodyKind::DataSource);
    assert_eq!(entity.content_type(), "text/plain");

    entity
        .set_byte_source(ByteSource::from_bytes("bytes"), None)
        .unwrap();
    assert!(entity.data_source().is_none());
    assert_eq!(entity.content_type(), "application/octet-stream");

    entity.set_parts(vec![Entity::new()], None).unwrap();
    assert!(entity.byte_source().is_none());
    assert_eq!(entity.content_type(), "multipart/form-data");

    entity
        .set_live_stream(LiveStream::new(futures::stream::empty()), None)
        .unwrap();
    assert_eq!(entity.body_kind(), BodyKind::LiveStream);
    assert!(matches!(entity.require_byte_source(), Err(Error::Parser(_))));
}

#[tokio::test]
async fn test_invalid_content_type_keeps_body() {
    let mut entity = Entity::new();
    entity.set_text("kept", None).unwrap();

    let err = entity
        .set_byte_source(ByteSource::from_bytes("lost"), Some("testContentType"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidContentType(_)));
    assert_eq!(entity.body_kind(), BodyKind::DataSource);
    assert_eq!(entity.content_type(), "text/plain");
}

#[test]
fn test_media_type_with_suffix() {
    let media_type = parse_media_type("application/test+xml; charset=utf-8").unwrap();
    assert_eq!(media_type.primary_type, "application");
    assert_eq!(media_type.sub_type, "test");
    assert_eq!(media_type.suffix, "xml");
    assert_eq!(media_type.charset(), Some("utf-8"));
    assert_eq!(
        format_media_type(&media_type),
        "application/test+xml; charset=utf-8"
    );

    assert!(!is_valid_content_type("testContentType"));
}

#[tokio::test]
async fn test_encode_then_decode() {
    let mut json = Entity::new();
    json.set_json(json!({"bodyPart": "jsonPart"}), None).unwrap();

    let mut xml = Entity::new();
    xml.set_xml("<name>Ballerina xml file part</name>", None).unwrap();
    xml.set_content_id("xml-part");

    let mut binary = Entity::new();
    binary
        .set_byte_array(Bytes::from_static(b"Ballerina binary file part"), None)
        .unwrap();
    binary.headers_mut().append("X-Part", "binary");

    let mut entity = Entity::new();
    entity
        .set_parts(vec![json, xml, binary], Some("multipart/mixed"))
        .unwrap();

    entity.encode_parts().await.unwrap();
    assert_eq!(entity.body_kind(), BodyKind::ByteSource);
    assert!(entity.media_type().boundary().is_some());

    let parts = entity.parts().await.unwrap();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].content_type(), "application/json");
    assert_eq!(parts[0].read_json().await.unwrap(), json!({"bodyPart": "jsonPart"}));
    assert_eq!(parts[1].content_id(), Some("xml-part"));
    assert_eq!(
        parts[1].read_xml().await.unwrap(),
        "<name>Ballerina xml file part</name>"
    );
    assert_eq!(parts[2].header("X-Part"), Some("binary"));
    assert_eq!(
        parts[2].read_bytes().await.unwrap(),
        Bytes::from_static(b"Ballerina binary file part")
    );
}

#[tokio::test]
async fn test_four_parts_survive_serialize_and_decode() {
    let dispositions = [
        ContentDisposition::new("inline").with_name("json"),
        ContentDisposition::new("attachment").with_filename("file-01.xml"),
        ContentDisposition::form_data("text"),
        ContentDisposition::new("attachment")
            .with_name("binary")
            .with_filename("file-01.bin"),
    ];

    let mut json = Entity::new();
    json.set_json(json!({"bodyPart": "jsonPart"}), None).unwrap();
    let mut xml = Entity::new();
    xml.set_xml("<name>Ballerina xml file part</name>", None).unwrap();
    let mut text = Entity::new();
    text.set_text("Ballerina text body part", None).unwrap();
    let mut binary = Entity::new();
    binary
        .set_byte_array(Bytes::from_static(b"Ballerina binary file part"), None)
        .unwrap();

    let mut parts = vec![json, xml, text, binary];
    for (part, disposition) in parts.iter_mut().zip(dispositions.iter()) {
        part.set_content_disposition(disposition.clone());
    }
    let mut entity = Entity::new();
    entity
        .set_parts(parts, Some(&format!("multipart/mixed; boundary={BOUNDARY}")))
        .unwrap();

    let mut wire = Vec::new();
    multipart::serialize(&mut entity, BOUNDARY, &mut wire).await.unwrap();

    let mut decoded = multipart_entity(wire);
    let parts = decoded.parts().await.unwrap();
    assert_eq!(parts.len(), 4);

    let content_types: Vec<_> = parts.iter().map(|p| p.content_type()).collect();
    assert_eq!(
        content_types,
        ["application/json", "application/xml", "text/plain", "application/octet-stream"]
    );
    for (part, disposition) in parts.iter().zip(dispositions.iter()) {
        assert_eq!(part.content_disposition(), Some(disposition));
    }

    assert_eq!(parts[0].read_json().await.unwrap(), json!({"bodyPart": "jsonPart"}));
    assert_eq!(
        parts[1].read_xml().await.unwrap(),
        "<name>Ballerina xml file part</name>"
    );
    assert_eq!(parts[2].read_text().await.unwrap(), "Ballerina text body part");
    assert_eq!(
        parts[3].read_bytes().await.unwrap(),
        Bytes::from_static(b"Ballerina binary file part")
    );
}

#[tokio::test]
async fn test_transfer_encoding_is_passed_through() {
    let body = format!(
        "--{BOUNDARY}\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
QmFsbGVyaW5h\r\n\
--{BOUNDARY}--"
    );
    let mut entity = multipart_entity(body);
    let parts = entity.parts().await.unwrap();
    assert_eq!(parts[0].header(header::CONTENT_TRANSFER_ENCODING), Some("base64"));

    entity.encode_parts().await.unwrap();
    assert_eq!(entity.body_kind(), BodyKind::ByteSource);

    let mut copy = Vec::new();
    entity.write_body(&mut copy).await.unwrap();
    let wire = String::from_utf8(copy).unwrap();
    assert!(wire.contains("\r\nContent-Transfer-Encoding: base64\r\n"));

    let mut decoded = multipart_entity(wire);
    let parts = decoded.parts().await.unwrap();
    assert_eq!(parts[0].header(header::CONTENT_TRANSFER_ENCODING), Some("base64"));
    assert_eq!(
        parts[0].read_bytes().await.unwrap(),
        Bytes::from_static(b"QmFsbGVyaW5h")
    );
}

#[tokio::test]
async fn test_zero_parts_encode_to_nothing() {
    let mut entity = Entity::new();
    entity
        .set_parts(Vec::new(), Some(&format!("multipart/mixed; boundary={BOUNDARY}")))
        .unwrap();

    let mut sink = Vec::new();
    entity.write_body(&mut sink).await.unwrap();
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_nested_multipart_is_decoded_lazily() {
    let inner = "--inner\r\n\
Content-Type: text/plain\r\n\
\r\n\
nested text\r\n\
--inner--";
    let outer = format!(
        "--{BOUNDARY}\r\n\
Content-Type: multipart/mixed; boundary=inner\r\n\
\r\n\
{inner}\r\n\
--{BOUNDARY}--"
    );
    let mut entity = multipart_entity(outer);

    let parts = entity.parts().await.unwrap();
    assert_eq!(parts.len(), 1);
    let nested = &mut parts[0];
    assert_eq!(nested.body_kind(), BodyKind::ByteSource);

    let children = nested.parts().await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].read_text().await.unwrap(), "nested text");
}

#[tokio::test]
async fn test_large_part_spills_to_disk() {
    let payload = "x".repeat(64 * 1024);
    let body = format!(
        "--{BOUNDARY}\r\n\
Content-Type: application/octet-stream\r\n\
\r\n\
{payload}\r\n\
--{BOUNDARY}--"
    );
    let mut entity = multipart_entity(body);
    let config = DecoderConfig::new().memory_threshold(1024);

    let parts = entity.parts_with_config(&config).await.unwrap();
    let source = parts[0].byte_source().unwrap();
    assert!(source.is_spilled());
    let path = source.spill_path().unwrap().to_path_buf();
    assert!(path.exists());

    parts[0].close_byte_source().unwrap();
    assert!(!path.exists());
    assert!(!parts[0].has_body());
}

#[tokio::test]
async fn test_replacing_part_list_removes_spill_files() {
    let payload = "y".repeat(8 * 1024);
    let body = format!(
        "--{BOUNDARY}\r\n\
\r\n\
{payload}\r\n\
--{BOUNDARY}--"
    );
    let mut entity = multipart_entity(body);
    let config = DecoderConfig::new().memory_threshold(512);

    let parts = entity.parts_with_config(&config).await.unwrap();
    assert_eq!(parts[0].content_type(), "application/octet-stream");
    let path = parts[0].byte_source().unwrap().spill_path().unwrap().to_path_buf();

    entity.set_text("replaced", None).unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_truncated_body_is_a_parser_error() {
    let body = format!("--{BOUNDARY}\r\nContent-Type: text/plain\r\n\r\nno end in sight");
    let mut entity = multipart_entity(body);

    let err = entity.parts().await.unwrap_err();
    assert!(matches!(err, Error::Parser(_)));
    assert!(err
        .to_string()
        .contains("Error occurred while decoding body parts from inputstream"));
}

#[tokio::test]
async fn test_live_stream_written_to_sink() {
    let chunks = vec![
        Ok(Bytes::from_static(b"event: one\n\n")),
        Ok(Bytes::from_static(b"event: two\n\n")),
    ];
    let mut entity = Entity::new();
    entity
        .set_live_stream(
            LiveStream::new(futures::stream::iter(chunks)),
            Some("text/event-stream"),
        )
        .unwrap();
    assert!(entity.event_stream().is_some());

    let mut sink = Vec::new();
    write_body(&mut entity, &mut sink).await.unwrap();
    assert_eq!(sink, b"event: one\n\nevent: two\n\n");
    assert!(!entity.has_body());
}

#[tokio::test]
async fn test_live_stream_error_surfaces() {
    let chunks: Vec<io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"partial")),
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "upstream closed")),
    ];
    let mut entity = Entity::new();
    entity
        .set_live_stream(LiveStream::new(futures::stream::iter(chunks)), None)
        .unwrap();

    let mut sink = Vec::new();
    let err = entity.write_body(&mut sink).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(sink, b"partial");
}

#[tokio::test]
async fn test_byte_stream_chunks() {
    let mut entity = Entity::new();
    entity
        .set_byte_source(ByteSource::from_bytes("abcdefghij"), None)
        .unwrap();

    let stream = entity.byte_stream(4).unwrap();
    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= 4);
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(collected, b"abcdefghij");
}

#[tokio::test]
async fn test_reader_and_writer_directly() {
    let mut wire = Vec::new();
    let mut writer = multipart::Writer::with_boundary(&mut wire, BOUNDARY).unwrap();
    writer.write_field("username", "john_doe").await.unwrap();
    writer.close().await.unwrap();

    let mut reader = multipart::Reader::new(wire.as_slice(), BOUNDARY);
    let part = reader.next_part().await.unwrap().unwrap();
    let disposition = ContentDisposition::parse(part.headers.get("content-disposition").unwrap()).unwrap();
    assert_eq!(disposition.name.as_deref(), Some("username"));
    assert_eq!(part.body.read_all().await.unwrap(), b"john_doe");
    assert!(reader.next_part().await.unwrap().is_none());
}

#[test]
fn test_base64_with_charset() {
    let encoded = encoding::encode_text("Ballerina text body part", None).unwrap();
    assert_eq!(
        encoding::decode_text(&encoded, Some("utf-8")).unwrap(),
        "Ballerina text body part"
    );
}
