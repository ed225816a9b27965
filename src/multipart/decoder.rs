//! Decoding a multipart byte stream into body part entities.

use super::config::DecoderConfig;
use super::reader::{RawPart, Reader};
use crate::body::Body;
use crate::disposition::ContentDisposition;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::header::{Headers, CONTENT_DISPOSITION, CONTENT_ID, CONTENT_LENGTH, CONTENT_TYPE};
use crate::media_type::{MediaType, APPLICATION_OCTET_STREAM};
use tokio::io::AsyncRead;

const MULTIPART_PREFIX: &str = "multipart/";

/// Splits a multipart body into raw parts.
///
/// On failure, the content of parts read so far is closed before returning.
pub async fn decode<R>(reader: R, boundary: &str, config: &DecoderConfig) -> Result<Vec<RawPart>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = Reader::with_config(reader, boundary, config.clone());
    let mut parts = Vec::new();
    loop {
        match reader.next_part().await {
            Ok(Some(part)) => parts.push(part),
            Ok(None) => {
                tracing::debug!(parts = parts.len(), "decoded multipart body");
                return Ok(parts);
            }
            Err(e) => {
                close_raw_parts(parts);
                return Err(e);
            }
        }
    }
}

/// Decodes `reader` into body parts and attaches them to `entity`.
///
/// Does nothing unless `content_type` is a `multipart/*` type. When no part
/// is found the entity is left without a part list. Nested multipart parts
/// keep their content as a byte source and are decoded on demand.
pub async fn parse_body<R>(
    entity: &mut Entity,
    content_type: &str,
    reader: R,
    config: &DecoderConfig,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let is_multipart = content_type
        .get(..MULTIPART_PREFIX.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(MULTIPART_PREFIX));
    if !is_multipart {
        return Ok(());
    }

    let raw_parts = decode_with_content_type(content_type, reader, config)
        .await
        .map_err(|e| Error::parser("Error occurred while decoding body parts from inputstream: ", e))?;
    if raw_parts.is_empty() {
        return Ok(());
    }

    let mut children = Vec::with_capacity(raw_parts.len());
    let mut remaining = raw_parts.into_iter();
    while let Some(raw) = remaining.next() {
        match populate_body_part(raw) {
            Ok(child) => children.push(child),
            Err(e) => {
                close_raw_parts(remaining);
                Body::PartList(children).release();
                return Err(Error::parser("Error occurred while populating body parts: ", e));
            }
        }
    }

    entity.replace_body(Body::PartList(children));
    Ok(())
}

async fn decode_with_content_type<R>(
    content_type: &str,
    reader: R,
    config: &DecoderConfig,
) -> Result<Vec<RawPart>>
where
    R: AsyncRead + Unpin,
{
    let media_type = MediaType::parse(content_type)?;
    let boundary = media_type
        .boundary()
        .ok_or_else(|| Error::Parser("missing boundary parameter".to_string()))?;
    decode(reader, boundary, config).await
}

/// Builds a child entity from a raw part.
///
/// The content is closed if the header block is unusable.
fn populate_body_part(raw: RawPart) -> Result<Entity> {
    let RawPart { headers, body } = raw;
    let mut part = Entity::new();

    if let Err(e) = populate_header_fields(&mut part, &headers) {
        if let Err(close_err) = body.close() {
            tracing::warn!(error = %close_err, "failed to close part content");
        }
        return Err(e);
    }

    *part.headers_mut() = headers;
    part.replace_body(Body::ByteSource(body));
    Ok(part)
}

fn populate_header_fields(part: &mut Entity, headers: &Headers) -> Result<()> {
    if let Some(len) = headers.get(CONTENT_LENGTH) {
        let len = len
            .trim()
            .parse::<u64>()
            .map_err(|e| Error::Parser(format!("invalid Content-Length {len:?}: {e}")))?;
        part.set_content_length(len);
    }
    if let Some(id) = headers.get(CONTENT_ID) {
        part.set_content_id(id.trim().trim_start_matches('<').trim_end_matches('>'));
    }
    // A part without Content-Type is treated as application/octet-stream.
    let content_type = headers.get(CONTENT_TYPE).unwrap_or(APPLICATION_OCTET_STREAM);
    part.set_media_type(MediaType::parse(content_type)?);
    if let Some(disposition) = headers.get(CONTENT_DISPOSITION) {
        part.set_content_disposition(ContentDisposition::parse(disposition)?);
    }
    Ok(())
}

fn close_raw_parts(parts: impl IntoIterator<Item = RawPart>) {
    for part in parts {
        if let Err(e) = part.body.close() {
            tracing::warn!(error = %e, "failed to close part content");
        }
    }
}
