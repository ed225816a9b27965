//! Multipart body reader.
//!
//! Implements RFC 2046 multipart parsing with async I/O. Part content above
//! the configured memory threshold is spilled to a temporary file.

use super::config::DecoderConfig;
use crate::body::ByteSource;
use crate::error::{Error, Result};
use crate::header::Headers;
use std::io::SeekFrom;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncSeekExt, AsyncWriteExt, BufReader};

const PEEK_BUFFER_SIZE: usize = 4096;

/// An undecoded part: its header block and its content.
#[derive(Debug)]
pub struct RawPart {
    pub headers: Headers,
    pub body: ByteSource,
}

/// How a segment read from the input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    /// Ended with `\n`.
    Line,
    /// Hit the segment size cap before a newline.
    Partial,
    /// Hit end of input; the segment may still hold bytes.
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Next,
    Close,
}

/// A multipart reader.
///
/// A delimiter is only recognized at the start of a line. The line break
/// preceding a delimiter belongs to the delimiter and is not part of the
/// content. Preamble and epilogue are skipped.
pub struct Reader<R> {
    buf_reader: BufReader<R>,
    dash_boundary: Vec<u8>, // "--boundary"
    config: DecoderConfig,
    parts_read: usize,
    started: bool,
    done: bool,
}

impl<R: AsyncRead + Unpin> Reader<R> {
    /// Creates a new multipart reader with the given boundary.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio_mime_entity::multipart::Reader;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let data = b"--boundary\r\n\r\nhello\r\n--boundary--";
    /// let mut reader = Reader::new(&data[..], "boundary");
    /// while let Some(part) = reader.next_part().await? {
    ///     let _content = part.body.read_all().await?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(r: R, boundary: &str) -> Self {
        Self::with_config(r, boundary, DecoderConfig::default())
    }

    /// Creates a reader with explicit limits and spill threshold.
    pub fn with_config(r: R, boundary: &str, config: DecoderConfig) -> Self {
        Self {
            buf_reader: BufReader::with_capacity(PEEK_BUFFER_SIZE, r),
            dash_boundary: format!("--{boundary}").into_bytes(),
            config,
            parts_read: 0,
            started: false,
            done: false,
        }
    }

    /// Number of parts returned so far.
    pub fn parts_read(&self) -> usize {
        self.parts_read
    }

    /// Returns the next part in the multipart body.
    ///
    /// Returns `None` after the closing delimiter.
    pub async fn next_part(&mut self) -> Result<Option<RawPart>> {
        if self.dash_boundary.len() <= 2 {
            return Err(Error::Parser("boundary is empty".to_string()));
        }
        if self.done {
            return Ok(None);
        }

        if !self.started {
            match self.skip_preamble().await? {
                Delimiter::Next => self.started = true,
                Delimiter::Close => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }

        let headers = self.read_headers().await?;
        let mut buffer = PartBuffer::new(self.config.get_memory_threshold());
        let delimiter = match self.read_content(&mut buffer).await {
            Ok(delimiter) => delimiter,
            Err(e) => {
                buffer.discard();
                return Err(e);
            }
        };
        let body = buffer.finish().await?;

        self.parts_read += 1;
        if delimiter == Delimiter::Close {
            self.done = true;
        }
        tracing::trace!(
            part = self.parts_read,
            len = ?body.len(),
            spilled = body.is_spilled(),
            "read multipart part"
        );
        Ok(Some(RawPart { headers, body }))
    }

    async fn skip_preamble(&mut self) -> Result<Delimiter> {
        let mut line = Vec::new();
        let mut at_line_start = true;
        loop {
            line.clear();
            let segment = self.read_segment(&mut line).await?;
            if at_line_start {
                if let Some(delimiter) = self.delimiter(&line, segment) {
                    return Ok(delimiter);
                }
            }
            match segment {
                Segment::Line => at_line_start = true,
                Segment::Partial => at_line_start = false,
                Segment::Eof => {
                    return Err(Error::Parser("missing start boundary".to_string()));
                }
            }
        }
    }

    /// Reads a header block, unfolding continuation lines.
    async fn read_headers(&mut self) -> Result<Headers> {
        let mut headers = Headers::new();
        let mut total_size = 0;
        let mut header_count = 0;
        let mut current: Option<(String, String)> = None;
        let mut line = Vec::new();

        loop {
            line.clear();
            loop {
                let segment = self.read_segment(&mut line).await?;
                if total_size + line.len() > self.config.get_max_header_size() {
                    return Err(Error::MessageTooLarge);
                }
                match segment {
                    Segment::Line => break,
                    Segment::Partial => continue,
                    Segment::Eof => {
                        return Err(Error::Parser(
                            "unexpected end of stream in part headers".to_string(),
                        ));
                    }
                }
            }
            total_size += line.len();

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(&['\r', '\n'][..]);

            // Empty line signals end of headers
            if text.is_empty() {
                break;
            }

            if text.starts_with(&[' ', '\t'][..]) {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(text.trim());
                }
                continue;
            }

            header_count += 1;
            if header_count > self.config.get_max_headers() {
                return Err(Error::MessageTooLarge);
            }

            if let Some((name, value)) = current.take() {
                headers.append(name, value);
            }
            current = parse_header_line(text).map(|(k, v)| (k.to_string(), v.to_string()));
        }

        if let Some((name, value)) = current {
            headers.append(name, value);
        }
        Ok(headers)
    }

    /// Copies part content into `buffer` up to the next delimiter.
    async fn read_content(&mut self, buffer: &mut PartBuffer) -> Result<Delimiter> {
        let mut line = Vec::new();
        // Line break held back until we know no delimiter follows it.
        let mut pending: &'static [u8] = b"";
        let mut at_line_start = true;

        loop {
            line.clear();
            let segment = self.read_segment(&mut line).await?;

            if at_line_start {
                if let Some(delimiter) = self.delimiter(&line, segment) {
                    return Ok(delimiter);
                }
            }

            match segment {
                Segment::Eof => {
                    return Err(Error::Parser(format!(
                        "unexpected end of stream before the closing boundary of part {}",
                        self.parts_read + 1
                    )));
                }
                // A CRLF split across two segments.
                Segment::Line if pending == b"\r" && line == b"\n" => {
                    pending = b"\r\n";
                    at_line_start = true;
                }
                Segment::Line => {
                    buffer.write(pending).await?;
                    let (content, terminator) = split_line_terminator(&line);
                    buffer.write(content).await?;
                    pending = terminator;
                    at_line_start = true;
                }
                Segment::Partial => {
                    buffer.write(pending).await?;
                    match line.strip_suffix(b"\r") {
                        Some(content) => {
                            buffer.write(content).await?;
                            pending = b"\r";
                        }
                        None => {
                            buffer.write(&line).await?;
                            pending = b"";
                        }
                    }
                    at_line_start = false;
                }
            }
        }
    }

    /// Appends at most `PEEK_BUFFER_SIZE` bytes to `line`, stopping after a newline.
    async fn read_segment(&mut self, line: &mut Vec<u8>) -> Result<Segment> {
        let start = line.len();
        loop {
            let buf = self.buf_reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(Segment::Eof);
            }

            let room = PEEK_BUFFER_SIZE - (line.len() - start);
            let window = &buf[..buf.len().min(room)];
            if let Some(pos) = window.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&window[..=pos]);
                self.buf_reader.consume(pos + 1);
                return Ok(Segment::Line);
            }

            let len = window.len();
            line.extend_from_slice(window);
            self.buf_reader.consume(len);
            if line.len() - start >= PEEK_BUFFER_SIZE {
                return Ok(Segment::Partial);
            }
        }
    }

    fn delimiter(&self, line: &[u8], segment: Segment) -> Option<Delimiter> {
        let rest = line.strip_prefix(self.dash_boundary.as_slice())?;
        if let Some(after) = rest.strip_prefix(b"--") {
            let after = skip_lwsp_char(after);
            return (after.is_empty() || is_line_break(after)).then_some(Delimiter::Close);
        }
        (segment == Segment::Line && is_line_break(skip_lwsp_char(rest))).then_some(Delimiter::Next)
    }
}

/// Accumulates one part's content, in memory up to a threshold and on disk beyond.
struct PartBuffer {
    memory: Vec<u8>,
    spill: Option<(tokio::fs::File, TempPath)>,
    threshold: usize,
    len: u64,
}

impl PartBuffer {
    fn new(threshold: usize) -> Self {
        Self {
            memory: Vec::new(),
            spill: None,
            threshold,
            len: 0,
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.len += data.len() as u64;

        if self.spill.is_none() && self.memory.len() + data.len() > self.threshold {
            self.spill_to_disk().await?;
        }
        match self.spill.as_mut() {
            Some((file, _)) => file.write_all(data).await?,
            None => self.memory.extend_from_slice(data),
        }
        Ok(())
    }

    async fn spill_to_disk(&mut self) -> Result<()> {
        let (file, path) = NamedTempFile::new()?.into_parts();
        tracing::debug!(path = %path.display(), threshold = self.threshold, "spilling part to disk");
        let (file, _) = self.spill.insert((tokio::fs::File::from_std(file), path));
        file.write_all(&self.memory).await?;
        self.memory = Vec::new();
        Ok(())
    }

    async fn finish(self) -> Result<ByteSource> {
        let Some((mut file, path)) = self.spill else {
            return Ok(ByteSource::from_bytes(self.memory));
        };
        let rewound = async {
            file.flush().await?;
            file.seek(SeekFrom::Start(0)).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = rewound {
            drop(file);
            if let Err(close_err) = path.close() {
                tracing::warn!(error = %close_err, "failed to remove spill file");
            }
            return Err(e.into());
        }
        Ok(ByteSource::from_spill_file(file, path, self.len))
    }

    fn discard(self) {
        if let Some((file, path)) = self.spill {
            drop(file);
            if let Err(e) = path.close() {
                tracing::warn!(error = %e, "failed to remove spill file");
            }
        }
    }
}

/// Parses a single header line.
fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches('\n').trim_end_matches('\r');
    let colon_pos = line.find(':')?;
    let key = line[..colon_pos].trim();
    let value = line[colon_pos + 1..].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Splits a line into content and its `\r\n` or `\n` terminator.
fn split_line_terminator(line: &[u8]) -> (&[u8], &'static [u8]) {
    if let Some(content) = line.strip_suffix(b"\r\n") {
        (content, &b"\r\n"[..])
    } else if let Some(content) = line.strip_suffix(b"\n") {
        (content, &b"\n"[..])
    } else {
        (line, &[][..])
    }
}

fn is_line_break(b: &[u8]) -> bool {
    b == b"\r\n" || b == b"\n"
}

/// Skips leading whitespace (space and tab).
fn skip_lwsp_char(b: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < b.len() && (b[i] == b' ' || b[i] == b'\t') {
        i += 1;
    }
    &b[i..]
}
