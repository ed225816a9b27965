//! Serializing a part list back into a multipart byte stream.

use super::writer::{generate_boundary, Writer};
use crate::body::{Body, BodyKind};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::media_type::MULTIPART_FORM_DATA;
use futures::future::{BoxFuture, FutureExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes the part list of `entity` to `sink` using `boundary`.
///
/// Each child is written with its header block followed by its body. A
/// multipart child with a part list is encoded recursively with its own
/// boundary, generated and stored in its media type when missing. Byte
/// sources are drained and closed; materialized values stay in place.
///
/// An entity without parts produces no output.
pub async fn serialize<W>(entity: &mut Entity, boundary: &str, sink: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let in_form_data = entity.media_type().is(MULTIPART_FORM_DATA);
    match entity.body_mut() {
        Body::PartList(parts) => {
            write_parts(parts, boundary.to_string(), in_form_data, sink).await?;
            tracing::debug!(boundary, parts = parts.len(), "encoded multipart body");
            Ok(())
        }
        Body::Empty => Ok(()),
        other => Err(Error::Parser(format!(
            "Entity doesn't contain body parts, found a {}",
            other.kind()
        ))),
    }
}

fn write_parts<'a, W>(
    parts: &'a mut [Entity],
    boundary: String,
    in_form_data: bool,
    sink: &'a mut W,
) -> BoxFuture<'a, Result<()>>
where
    W: AsyncWrite + Unpin + Send,
{
    async move {
        if parts.is_empty() {
            return Ok(());
        }

        let mut writer = Writer::with_boundary(&mut *sink, &boundary)?;
        for part in parts.iter_mut() {
            let nested = if part.body_kind() == BodyKind::PartList && part.media_type().is_multipart() {
                Some(part.ensure_boundary()?)
            } else {
                None
            };
            let headers = part.part_headers(in_form_data);
            writer.create_part(&headers).await?;
            write_part_body(part, nested, &mut **writer.get_mut()).await?;
        }
        writer.close().await
    }
    .boxed()
}

async fn write_part_body<W>(part: &mut Entity, nested: Option<String>, sink: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let in_form_data = part.media_type().is(MULTIPART_FORM_DATA);
    match part.body_mut() {
        Body::Empty => {}
        Body::DataSource(data) => sink.write_all(&data.to_bytes()?).await?,
        Body::PartList(children) => {
            let boundary = match nested {
                Some(boundary) => boundary,
                None => generate_boundary()?,
            };
            write_parts(children, boundary, in_form_data, sink).await?;
        }
        Body::LiveStream(_) => {
            if let Some(mut stream) = part.take_live_stream() {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| {
                        tracing::error!(error = %e, "live stream producer failed while encoding part");
                        e
                    })?;
                    sink.write_all(&chunk).await?;
                }
            }
        }
        Body::ByteSource(_) => {
            if let Some(mut source) = part.take_byte_source() {
                let copied = tokio::io::copy(&mut source, sink).await;
                let closed = source.close();
                copied?;
                closed?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{ByteSource, LiveStream};
    use crate::disposition::ContentDisposition;
    use serde_json::json;

    fn text_part(name: &str, text: &str) -> Entity {
        let mut part = Entity::new();
        part.set_text(text, None).unwrap();
        part.set_content_disposition(ContentDisposition::new("").with_name(name));
        part
    }

    #[tokio::test]
    async fn test_serialize_wire_format() {
        let mut entity = Entity::new();
        let mut json = Entity::new();
        json.set_json(json!({"bodyPart": "jsonPart"}), None).unwrap();
        entity
            .set_parts(vec![text_part("a", "one"), json], Some("multipart/mixed; boundary=b"))
            .unwrap();

        let mut out = Vec::new();
        serialize(&mut entity, "b", &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "--b\r\n\
Content-Type: text/plain\r\n\
\r\n\
one\r\n\
--b\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"bodyPart\":\"jsonPart\"}\r\n\
--b--"
        );
    }

    #[tokio::test]
    async fn test_form_data_defaults_disposition() {
        let mut entity = Entity::new();
        entity.set_parts(vec![text_part("field", "v")], None).unwrap();

        let mut out = Vec::new();
        serialize(&mut entity, "b", &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("--b\r\nContent-Disposition: form-data; name=\"field\"\r\n"));
    }

    #[tokio::test]
    async fn test_zero_parts_is_empty_output() {
        let mut entity = Entity::new();
        entity.set_parts(Vec::new(), Some("multipart/mixed; boundary=b")).unwrap();
        let mut out = Vec::new();
        serialize(&mut entity, "b", &mut out).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_byte_source_is_drained_and_detached() {
        let mut part = Entity::new();
        part.set_byte_source(ByteSource::from_bytes("raw bytes"), Some("text/plain")).unwrap();
        let mut entity = Entity::new();
        entity.set_parts(vec![part], Some("multipart/mixed")).unwrap();

        let mut out = Vec::new();
        serialize(&mut entity, "b", &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("\r\n\r\nraw bytes\r\n--b--"));

        let Body::PartList(parts) = entity.body() else {
            panic!("part list expected");
        };
        assert!(!parts[0].has_body());
    }

    #[tokio::test]
    async fn test_failed_live_stream_is_detached() {
        let chunks = vec![
            Ok(bytes::Bytes::from_static(b"half")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "producer gone")),
        ];
        let mut part = Entity::new();
        part.set_live_stream(LiveStream::new(futures::stream::iter(chunks)), None)
            .unwrap();
        let mut entity = Entity::new();
        entity.set_parts(vec![part], Some("multipart/mixed")).unwrap();

        let mut out = Vec::new();
        let err = serialize(&mut entity, "b", &mut out).await.unwrap_err();
        assert!(err.to_string().contains("producer gone"));
        assert!(String::from_utf8(out).unwrap().ends_with("\r\n\r\nhalf"));

        let Body::PartList(parts) = entity.body() else {
            panic!("part list expected");
        };
        assert!(!parts[0].has_body());
    }

    #[tokio::test]
    async fn test_nested_part_gets_own_boundary() {
        let mut inner = Entity::new();
        inner.set_parts(vec![text_part("x", "deep")], Some("multipart/mixed")).unwrap();
        let mut entity = Entity::new();
        entity.set_parts(vec![inner], Some("multipart/mixed; boundary=outer")).unwrap();

        let mut out = Vec::new();
        serialize(&mut entity, "outer", &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();

        let Body::PartList(parts) = entity.body() else {
            panic!("part list expected");
        };
        let inner_boundary = parts[0].media_type().boundary().unwrap().to_string();
        assert_ne!(inner_boundary, "outer");
        assert!(out.contains(&format!("Content-Type: multipart/mixed; boundary={inner_boundary}\r\n")));
        assert!(out.contains(&format!("--{inner_boundary}\r\n")));
        assert!(out.contains(&format!("deep\r\n--{inner_boundary}--\r\n--outer--")));
    }

    #[tokio::test]
    async fn test_serialize_rejects_other_bodies() {
        let mut entity = Entity::new();
        entity.set_text("not parts", None).unwrap();
        let mut out = Vec::new();
        assert!(matches!(serialize(&mut entity, "b", &mut out).await, Err(Error::Parser(_))));
    }
}
