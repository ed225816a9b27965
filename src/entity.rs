//! MIME entities and their body state machine.
//!
//! An [`Entity`] carries typed header fields (media type, disposition,
//! content id and length), free-form headers, and a [`Body`]. Every body
//! setter replaces the previous representation and closes whatever handle it
//! held. Multipart bodies are decoded lazily by [`Entity::parts`] and cached
//! as a part list.

use crate::body::{Body, BodyKind, ByteSource, DataSource, DataValue, LiveStream};
use crate::charset;
use crate::disposition::{format_content_disposition, ContentDisposition, FORM_DATA};
use crate::error::{Error, Result};
use crate::header::{Headers, CONTENT_DISPOSITION, CONTENT_ID, CONTENT_TYPE};
use crate::media_type::{
    MediaType, APPLICATION_JSON, APPLICATION_OCTET_STREAM, APPLICATION_XML, MULTIPART_FORM_DATA,
    TEXT_EVENT_STREAM, TEXT_PLAIN,
};
use crate::multipart::{self, DecoderConfig};
use crate::stream;
use bytes::Bytes;
use quick_xml::events::Event;
use tokio::io::{AsyncReadExt, AsyncWrite};

/// A MIME entity: a top-level message body or one body part.
#[derive(Debug, Default)]
pub struct Entity {
    media_type: MediaType,
    content_disposition: Option<ContentDisposition>,
    content_id: Option<String>,
    content_length: Option<u64>,
    headers: Headers,
    body: Body,
}

impl Entity {
    /// Creates an entity with no media type and no body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the media type; empty when none is set.
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// Returns the media type for in-place edits.
    pub fn media_type_mut(&mut self) -> &mut MediaType {
        &mut self.media_type
    }

    /// Replaces the media type.
    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = media_type;
    }

    /// Parses and sets the Content-Type.
    ///
    /// On a parse failure the current media type is kept.
    pub fn set_content_type(&mut self, content_type: &str) -> Result<()> {
        self.media_type = MediaType::parse(content_type)?;
        Ok(())
    }

    /// The Content-Type as a header value; empty when no type is set.
    pub fn content_type(&self) -> String {
        self.media_type.to_string()
    }

    /// Returns the Content-Disposition, if any.
    pub fn content_disposition(&self) -> Option<&ContentDisposition> {
        self.content_disposition.as_ref()
    }

    /// Sets the Content-Disposition.
    pub fn set_content_disposition(&mut self, disposition: ContentDisposition) {
        self.content_disposition = Some(disposition);
    }

    /// Returns the Content-Id without angle brackets.
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Sets the Content-Id.
    pub fn set_content_id(&mut self, id: impl Into<String>) {
        self.content_id = Some(id.into());
    }

    /// Returns the declared content length.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Content length, or `-1` when unknown.
    pub fn size(&self) -> i64 {
        self.content_length
            .and_then(|len| i64::try_from(len).ok())
            .unwrap_or(-1)
    }

    /// Sets the declared content length.
    pub fn set_content_length(&mut self, len: u64) {
        self.content_length = Some(len);
    }

    /// Headers other than the typed fields above.
    ///
    /// Decoded parts keep their full header block here. When an entity is
    /// encoded, Content-Type, Content-Disposition and Content-Id are written
    /// from the typed fields and any copies in this map are skipped.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the free-form headers for editing.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the first value of the named header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns the current body representation.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Returns which body representation is attached.
    pub fn body_kind(&self) -> BodyKind {
        self.body.kind()
    }

    /// Takes the body out of the entity without closing it.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Reports whether any body representation is attached.
    pub fn has_body(&self) -> bool {
        self.body.kind() != BodyKind::Empty
    }

    /// Reports whether the body still has to be streamed, i.e. it is a byte
    /// source or a part list rather than a materialized value.
    pub fn requires_streaming(&self) -> bool {
        matches!(self.body.kind(), BodyKind::ByteSource | BodyKind::PartList)
    }

    pub(crate) fn replace_body(&mut self, body: Body) {
        std::mem::replace(&mut self.body, body).release();
    }

    /// Applies the content type, falling back to `default` when none is given.
    fn apply_content_type(&mut self, content_type: Option<&str>, default: &str) -> Result<()> {
        self.media_type = MediaType::parse(content_type.unwrap_or(default))?;
        Ok(())
    }

    /// Attaches a byte source; the default type is `application/octet-stream`.
    pub fn set_byte_source(&mut self, source: ByteSource, content_type: Option<&str>) -> Result<()> {
        self.apply_content_type(content_type, APPLICATION_OCTET_STREAM)?;
        self.replace_body(Body::ByteSource(source));
        Ok(())
    }

    /// Attaches a materialized value.
    ///
    /// Without a content type, the default follows the value: `text/plain`,
    /// `application/json`, `application/xml` or `application/octet-stream`.
    pub fn set_data_source(&mut self, data: DataSource, content_type: Option<&str>) -> Result<()> {
        let default = match data.value() {
            DataValue::Text(_) => TEXT_PLAIN,
            DataValue::Json(_) => APPLICATION_JSON,
            DataValue::Xml(_) => APPLICATION_XML,
            DataValue::Binary(_) => APPLICATION_OCTET_STREAM,
        };
        self.apply_content_type(content_type, default)?;
        self.replace_body(Body::DataSource(data));
        Ok(())
    }

    /// Attaches a text value; the default type is `text/plain`.
    pub fn set_text(&mut self, text: impl Into<String>, content_type: Option<&str>) -> Result<()> {
        self.set_data_source(DataSource::new(DataValue::Text(text.into()), false), content_type)
    }

    /// Attaches a JSON value; the default type is `application/json`.
    pub fn set_json(&mut self, json: serde_json::Value, content_type: Option<&str>) -> Result<()> {
        self.set_data_source(DataSource::new(DataValue::Json(json), true), content_type)
    }

    /// Attaches an XML document; it must be well formed.
    pub fn set_xml(&mut self, xml: impl Into<String>, content_type: Option<&str>) -> Result<()> {
        let xml = xml.into();
        validate_xml(&xml)?;
        self.set_data_source(DataSource::new(DataValue::Xml(xml), false), content_type)
    }

    /// Attaches bytes; the default type is `application/octet-stream`.
    pub fn set_byte_array(&mut self, data: impl Into<Bytes>, content_type: Option<&str>) -> Result<()> {
        self.set_data_source(DataSource::new(DataValue::Binary(data.into()), false), content_type)
    }

    /// Attaches body parts; the default type is `multipart/form-data`.
    pub fn set_parts(&mut self, parts: Vec<Entity>, content_type: Option<&str>) -> Result<()> {
        self.apply_content_type(content_type, MULTIPART_FORM_DATA)?;
        self.replace_body(Body::PartList(parts));
        Ok(())
    }

    /// Attaches a live stream; the default type is `application/octet-stream`.
    pub fn set_live_stream(&mut self, stream: LiveStream, content_type: Option<&str>) -> Result<()> {
        self.apply_content_type(content_type, APPLICATION_OCTET_STREAM)?;
        self.replace_body(Body::LiveStream(stream));
        Ok(())
    }

    /// Returns the byte source, if that is the current representation.
    ///
    /// Never triggers a decode.
    pub fn byte_source(&mut self) -> Option<&mut ByteSource> {
        match &mut self.body {
            Body::ByteSource(source) => Some(source),
            _ => None,
        }
    }

    /// Detaches and returns the byte source without closing it.
    pub fn take_byte_source(&mut self) -> Option<ByteSource> {
        match std::mem::take(&mut self.body) {
            Body::ByteSource(source) => Some(source),
            other => {
                self.body = other;
                None
            }
        }
    }

    /// Returns the byte source, or an error explaining why there is none.
    pub fn require_byte_source(&mut self) -> Result<&mut ByteSource> {
        match &mut self.body {
            Body::ByteSource(source) => Ok(source),
            other => Err(missing_byte_source(other.kind())),
        }
    }

    /// Closes and detaches the byte source, removing any spill file.
    pub fn close_byte_source(&mut self) -> Result<()> {
        match self.take_byte_source() {
            Some(source) => Ok(source.close()?),
            None => Ok(()),
        }
    }

    /// Returns the materialized value, if that is the current representation.
    pub fn data_source(&self) -> Option<&DataSource> {
        match &self.body {
            Body::DataSource(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the live stream, if that is the current representation.
    pub fn live_stream(&mut self) -> Option<&mut LiveStream> {
        match &mut self.body {
            Body::LiveStream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Detaches and returns the live stream.
    pub fn take_live_stream(&mut self) -> Option<LiveStream> {
        match std::mem::take(&mut self.body) {
            Body::LiveStream(stream) => Some(stream),
            other => {
                self.body = other;
                None
            }
        }
    }

    /// The live stream of a `text/event-stream` entity.
    pub fn event_stream(&mut self) -> Option<&mut LiveStream> {
        if !self.media_type.is(TEXT_EVENT_STREAM) {
            return None;
        }
        self.live_stream()
    }

    /// Returns the body as a chunk stream.
    ///
    /// A byte source is converted into a live stream of at most `chunk_size`
    /// bytes per chunk; an existing live stream is returned as is.
    pub fn byte_stream(&mut self, chunk_size: usize) -> Result<&mut LiveStream> {
        if let Some(source) = self.take_byte_source() {
            self.body = Body::LiveStream(source.into_stream(chunk_size));
        }
        match &mut self.body {
            Body::LiveStream(stream) => Ok(stream),
            other => Err(missing_byte_source(other.kind())),
        }
    }

    /// Reads up to `max` bytes from the byte source.
    ///
    /// Returns `None` at end of input, after closing and detaching the source.
    pub async fn next_chunk(&mut self, max: usize) -> Result<Option<Bytes>> {
        let source = self.require_byte_source()?;
        let mut buf = vec![0u8; max.max(1)];
        let read = source.read(&mut buf).await?;
        if read == 0 {
            self.close_byte_source()?;
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some(Bytes::from(buf)))
    }

    /// Returns the body parts, decoding them from the byte source on first use.
    ///
    /// Uses the default [`DecoderConfig`].
    pub async fn parts(&mut self) -> Result<&mut [Entity]> {
        self.parts_with_config(&DecoderConfig::default()).await
    }

    /// Returns the body parts, decoding them with the given limits on first use.
    ///
    /// The decoded list replaces the byte source, so later calls return the
    /// same parts. Nested multipart parts stay undecoded until their own
    /// `parts` is called. Fails with [`Error::Parser`] when the media type is
    /// not composite; the body is left untouched in that case.
    pub async fn parts_with_config(&mut self, config: &DecoderConfig) -> Result<&mut [Entity]> {
        if !self.media_type.is_composite() {
            return Err(Error::Parser(format!(
                "Entity body is not a type of composite media type. Received content-type : {}",
                self.media_type.base_type().unwrap_or_default()
            )));
        }

        if let Some(mut source) = self.take_byte_source() {
            let content_type = self.content_type();
            let decoded = multipart::parse_body(self, &content_type, &mut source, config).await;
            if let Err(e) = source.close() {
                tracing::warn!(error = %e, "failed to close byte source after decoding parts");
            }
            decoded?;
        }

        match &mut self.body {
            Body::PartList(parts) => Ok(parts.as_mut_slice()),
            _ => Ok(Default::default()),
        }
    }

    /// Replaces the part list with its encoded form as an in-memory byte source.
    ///
    /// The boundary comes from the media type, or is generated and added to
    /// it. Calling [`Entity::parts`] afterwards decodes the bytes again.
    pub async fn encode_parts(&mut self) -> Result<()> {
        if !self.media_type.is_multipart() {
            return Err(Error::Parser(format!(
                "Entity doesn't contain body parts. Received content-type : {}",
                self.media_type.base_type().unwrap_or_default()
            )));
        }
        let boundary = self.ensure_boundary()?;
        let mut encoded = Vec::new();
        multipart::serialize(self, &boundary, &mut encoded).await?;
        self.replace_body(Body::ByteSource(ByteSource::from_bytes(encoded)));
        Ok(())
    }

    /// Returns the boundary parameter, generating and storing one if missing.
    pub(crate) fn ensure_boundary(&mut self) -> Result<String> {
        if let Some(boundary) = self.media_type.boundary() {
            return Ok(boundary.to_string());
        }
        let boundary = multipart::generate_boundary()?;
        self.media_type.parameters.insert("boundary", boundary.clone());
        Ok(boundary)
    }

    /// Consumes the byte source and returns its bytes.
    pub async fn read_bytes(&mut self) -> Result<Bytes> {
        let data = self.consume_byte_source("byte array payload is null").await?;
        Ok(Bytes::from(data))
    }

    /// Consumes the byte source and decodes it with the declared charset.
    pub async fn read_text(&mut self) -> Result<String> {
        let data = self.consume_byte_source("String payload is null").await?;
        charset::decode_text(&data, self.media_type.charset())
    }

    /// Consumes the byte source and parses it as JSON.
    pub async fn read_json(&mut self) -> Result<serde_json::Value> {
        let data = self.consume_byte_source("empty JSON document").await?;
        let text = charset::decode_text(&data, self.media_type.charset())?;
        if text.trim().is_empty() {
            return Err(Error::NoContent("empty JSON document".to_string()));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Consumes the byte source and checks it is well-formed XML.
    pub async fn read_xml(&mut self) -> Result<String> {
        let data = self.consume_byte_source("Empty xml payload").await?;
        let text = charset::decode_text(&data, self.media_type.charset())?;
        if text.trim().is_empty() {
            return Err(Error::NoContent("Empty xml payload".to_string()));
        }
        validate_xml(&text)?;
        Ok(text)
    }

    async fn consume_byte_source(&mut self, missing: &str) -> Result<Vec<u8>> {
        let source = self
            .take_byte_source()
            .ok_or_else(|| Error::NoContent(missing.to_string()))?;
        Ok(source.read_all().await?)
    }

    /// Writes the body to `sink`. See [`crate::stream::write_body`].
    pub async fn write_body<W>(&mut self, sink: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        stream::write_body(self, sink).await
    }

    /// Header block written for this entity as a body part.
    ///
    /// `in_form_data` tells whether the enclosing entity is
    /// `multipart/form-data`.
    pub(crate) fn part_headers(&self, in_form_data: bool) -> Headers {
        let mut headers = Headers::new();

        if let Some(disposition) = &self.content_disposition {
            let value = if disposition.disposition_type.is_empty()
                && (in_form_data || self.media_type.is(MULTIPART_FORM_DATA))
            {
                let mut defaulted = disposition.clone();
                defaulted.disposition_type = FORM_DATA.to_string();
                format_content_disposition(&defaulted)
            } else {
                format_content_disposition(disposition)
            };
            if !value.is_empty() {
                headers.append(CONTENT_DISPOSITION, value);
            }
        }

        if !self.media_type.is_empty() {
            headers.append(CONTENT_TYPE, self.media_type.to_string());
        }

        if let Some(id) = self.content_id.as_deref().filter(|id| !id.is_empty()) {
            headers.append(CONTENT_ID, format!("<{}>", id.trim_start_matches('<').trim_end_matches('>')));
        }

        for (name, value) in self.headers.iter() {
            let typed = [CONTENT_TYPE, CONTENT_DISPOSITION, CONTENT_ID]
                .iter()
                .any(|typed| typed.eq_ignore_ascii_case(name));
            if !typed {
                headers.append(name, value);
            }
        }
        headers
    }

    pub(crate) fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}

fn missing_byte_source(kind: BodyKind) -> Error {
    match kind {
        BodyKind::DataSource => Error::Parser(
            "Byte source is not available but payload can be obtained either as xml, json, string or byte[] type"
                .to_string(),
        ),
        BodyKind::PartList => Error::Parser(
            "Byte source is not available since payload contains a set of body parts".to_string(),
        ),
        BodyKind::LiveStream => {
            Error::Parser("Byte source is not available since payload is a live stream".to_string())
        }
        BodyKind::Empty | BodyKind::ByteSource => {
            Error::NoContent("Byte source is not available as payload".to_string())
        }
    }
}

/// Checks that `xml` is a single well-formed document.
fn validate_xml(xml: &str) -> Result<()> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut depth = 0usize;
    let mut roots = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Empty(_) if depth == 0 => roots += 1,
            Event::Text(text) if depth == 0 => {
                let text = text.unescape()?;
                if !text.trim().is_empty() {
                    return Err(Error::Xml("text outside of the root element".to_string()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    match (roots, depth) {
        (0, _) => Err(Error::Xml("no root element".to_string())),
        (_, d) if d > 0 => Err(Error::Xml("unclosed element".to_string())),
        (1, _) => Ok(()),
        _ => Err(Error::Xml("more than one root element".to_string())),
    }
}
