//! Entity body representations.
//!
//! An entity body is exactly one of:
//! - [`ByteSource`]: a single-use byte stream, in memory, spilled to a
//!   temporary file, or supplied by the caller
//! - [`DataSource`]: a fully materialized value that can be read repeatedly
//! - a part list: the decoded child entities of a multipart body
//! - [`LiveStream`]: a pull-driven producer of byte chunks
//!
//! [`Body`] models the choice as a single enum, so setting one
//! representation necessarily drops the others.

use crate::entity::Entity;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use pin_project::pin_project;
use std::fmt;
use std::io::{self, Cursor};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::io::ReaderStream;

/// Backing storage of a [`ByteSource`].
#[pin_project(project = SourceProj)]
enum Source {
    Memory(#[pin] Cursor<Bytes>),
    File(#[pin] tokio::fs::File),
    Reader(#[pin] Pin<Box<dyn AsyncRead + Send>>),
}

impl AsyncRead for Source {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.project() {
            SourceProj::Memory(r) => r.poll_read(cx, buf),
            SourceProj::File(r) => r.poll_read(cx, buf),
            SourceProj::Reader(r) => r.poll_read(cx, buf),
        }
    }
}

/// A single-use, closable byte stream.
///
/// A source produced by the multipart decoder for a large part is backed by a
/// temporary file. The file belongs to the source and is removed by
/// [`ByteSource::close`].
#[pin_project]
pub struct ByteSource {
    #[pin]
    source: Source,
    spill: Option<TempPath>,
    len: Option<u64>,
}

impl ByteSource {
    /// Creates an in-memory source.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let len = Some(data.len() as u64);
        Self {
            source: Source::Memory(Cursor::new(data)),
            spill: None,
            len,
        }
    }

    /// Wraps a caller-supplied reader, e.g. a network body.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            source: Source::Reader(Box::pin(reader)),
            spill: None,
            len: None,
        }
    }

    /// Creates a source backed by a spill file positioned at its start.
    pub(crate) fn from_spill_file(file: tokio::fs::File, path: TempPath, len: u64) -> Self {
        Self {
            source: Source::File(file),
            spill: Some(path),
            len: Some(len),
        }
    }

    /// Total length in bytes, when known up front.
    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// Reports whether the content lives in a temporary file.
    pub fn is_spilled(&self) -> bool {
        self.spill.is_some()
    }

    /// Path of the spill file, if any.
    pub fn spill_path(&self) -> Option<&Path> {
        self.spill.as_deref()
    }

    /// Reads the remaining bytes, then closes the source.
    ///
    /// The source is closed on the error path too.
    pub async fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.len.unwrap_or(0) as usize);
        let read = self.read_to_end(&mut data).await;
        let closed = self.close();
        read?;
        closed?;
        Ok(data)
    }

    /// Releases the underlying handle and removes the spill file.
    pub fn close(self) -> io::Result<()> {
        let Self { source, spill, .. } = self;
        drop(source);
        match spill {
            Some(path) => {
                let display = path.display().to_string();
                path.close().map_err(|e| {
                    io::Error::new(e.kind(), format!("unable to remove spill file {display}: {e}"))
                })
            }
            None => Ok(()),
        }
    }

    /// Converts the source into a chunk stream of at most `chunk_size` bytes per chunk.
    ///
    /// The spill file, if any, lives as long as the stream.
    pub fn into_stream(self, chunk_size: usize) -> LiveStream {
        LiveStream::new(ReaderStream::with_capacity(self, chunk_size.max(1)))
    }
}

impl AsyncRead for ByteSource {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().source.poll_read(cx, buf)
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Memory(_) => "memory",
            Source::File(_) => "file",
            Source::Reader(_) => "reader",
        };
        f.debug_struct("ByteSource")
            .field("kind", &kind)
            .field("len", &self.len)
            .field("spill", &self.spill.as_deref())
            .finish()
    }
}

/// A materialized body value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Text(String),
    Json(serde_json::Value),
    /// A well-formed XML document, kept as text.
    Xml(String),
    Binary(Bytes),
}

/// A fully materialized, repeatedly readable body.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    value: DataValue,
    parse_as_json: bool,
}

impl DataSource {
    /// Creates a data source; `parse_as_json` marks the value for JSON serialization.
    pub fn new(value: DataValue, parse_as_json: bool) -> Self {
        Self { value, parse_as_json }
    }

    /// Returns the materialized value.
    pub fn value(&self) -> &DataValue {
        &self.value
    }

    /// Reports whether the value is serialized as JSON.
    pub fn is_json(&self) -> bool {
        self.parse_as_json
    }

    /// Serializes the value for the wire.
    ///
    /// JSON values flagged as JSON are rendered by `serde_json`. Without the
    /// flag a JSON string is written raw and any other JSON value as JSON
    /// text. Text and XML are written as UTF-8, binary verbatim.
    pub fn to_bytes(&self) -> crate::Result<Bytes> {
        let bytes = match &self.value {
            DataValue::Json(v) if self.parse_as_json => Bytes::from(serde_json::to_vec(v)?),
            DataValue::Json(serde_json::Value::String(s)) => Bytes::from(s.clone().into_bytes()),
            DataValue::Json(v) => Bytes::from(v.to_string().into_bytes()),
            DataValue::Text(s) | DataValue::Xml(s) => Bytes::from(s.clone().into_bytes()),
            DataValue::Binary(b) => b.clone(),
        };
        Ok(bytes)
    }
}

/// A pull-driven, non-restartable sequence of byte chunks.
///
/// Each call to [`LiveStream::next`] yields a chunk, an error, or `None` at end.
pub struct LiveStream {
    inner: BoxStream<'static, io::Result<Bytes>>,
}

impl LiveStream {
    /// Wraps a chunk producer.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Pulls the next chunk from the producer.
    pub async fn next(&mut self) -> Option<io::Result<Bytes>> {
        self.inner.next().await
    }
}

impl Stream for LiveStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LiveStream")
    }
}

/// Discriminant of the active [`Body`] representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Empty,
    ByteSource,
    DataSource,
    PartList,
    LiveStream,
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BodyKind::Empty => "empty",
            BodyKind::ByteSource => "byte source",
            BodyKind::DataSource => "data source",
            BodyKind::PartList => "part list",
            BodyKind::LiveStream => "live stream",
        };
        f.write_str(name)
    }
}

/// The body of an entity: exactly one representation at a time.
#[derive(Debug, Default)]
pub enum Body {
    /// Initial state; never re-entered through a setter.
    #[default]
    Empty,
    ByteSource(ByteSource),
    DataSource(DataSource),
    PartList(Vec<Entity>),
    LiveStream(LiveStream),
}

impl Body {
    /// Returns the discriminant of this body.
    pub fn kind(&self) -> BodyKind {
        match self {
            Body::Empty => BodyKind::Empty,
            Body::ByteSource(_) => BodyKind::ByteSource,
            Body::DataSource(_) => BodyKind::DataSource,
            Body::PartList(_) => BodyKind::PartList,
            Body::LiveStream(_) => BodyKind::LiveStream,
        }
    }

    /// Closes open handles held by this body, including those of child parts.
    ///
    /// Close failures are logged; the body is gone either way.
    pub(crate) fn release(self) {
        match self {
            Body::ByteSource(source) => {
                if let Err(e) = source.close() {
                    tracing::warn!(error = %e, "failed to close byte source");
                }
            }
            Body::PartList(parts) => {
                for part in parts {
                    part.into_body().release();
                }
            }
            Body::LiveStream(stream) => drop(stream),
            Body::Empty | Body::DataSource(_) => {}
        }
    }
}
