//! Multipart MIME writer.
//!
//! Implements RFC 2046 multipart generation with async I/O. The output is
//! `--boundary\r\n`, each part's header block, a blank line and its content,
//! `\r\n--boundary\r\n` between parts and `\r\n--boundary--` after the last
//! one. A writer that never created a part writes nothing at all.

use crate::disposition::ContentDisposition;
use crate::error::{Error, Result};
use crate::grammar::{is_valid_boundary, quote_if_needed};
use crate::header::{Headers, CONTENT_DISPOSITION};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A multipart MIME writer.
pub struct Writer<W> {
    writer: W,
    boundary: String,
    has_parts: bool,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    /// Creates a new multipart writer with a random boundary.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio_mime_entity::multipart::Writer;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut output = Vec::new();
    /// let mut writer = Writer::new(&mut output)?;
    /// writer.write_field("name", "value").await?;
    /// writer.close().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(writer: W) -> Result<Self> {
        Ok(Self {
            writer,
            boundary: generate_boundary()?,
            has_parts: false,
        })
    }

    /// Creates a writer for a caller-chosen boundary.
    pub fn with_boundary(writer: W, boundary: &str) -> Result<Self> {
        let mut w = Self {
            writer,
            boundary: String::new(),
            has_parts: false,
        };
        w.set_boundary(boundary.to_string())?;
        Ok(w)
    }

    /// Returns the writer's boundary string.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Sets a custom boundary.
    ///
    /// This must be called before creating any parts.
    /// The boundary must be 1-70 characters and contain only valid characters.
    pub fn set_boundary(&mut self, boundary: String) -> Result<()> {
        if self.has_parts {
            return Err(Error::Parser(
                "cannot set boundary after writing parts".to_string(),
            ));
        }
        if !is_valid_boundary(&boundary) {
            return Err(Error::Parser(format!("invalid boundary: {boundary:?}")));
        }
        self.boundary = boundary;
        Ok(())
    }

    /// Returns the Content-Type header value for the given multipart subtype.
    pub fn content_type(&self, sub_type: &str) -> String {
        format!("multipart/{}; boundary={}", sub_type, quote_if_needed(&self.boundary))
    }

    /// Writes the delimiter and header block of a new part.
    ///
    /// Returns a PartWriter that can be used to write the part's body.
    pub async fn create_part(&mut self, headers: &Headers) -> Result<PartWriter<'_, W>> {
        if self.has_parts {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer
            .write_all(format!("--{}\r\n", self.boundary).as_bytes())
            .await?;

        for (name, value) in headers.iter() {
            self.writer
                .write_all(format!("{}: {}\r\n", name, value).as_bytes())
                .await?;
        }

        // Empty line after headers
        self.writer.write_all(b"\r\n").await?;

        self.has_parts = true;

        Ok(PartWriter {
            writer: &mut self.writer,
        })
    }

    /// Writes a complete form field with value.
    pub async fn write_field(&mut self, name: &str, value: &str) -> Result<()> {
        let mut headers = Headers::new();
        headers.append(CONTENT_DISPOSITION, ContentDisposition::form_data(name).to_string());
        let mut part = self.create_part(&headers).await?;
        part.write_all(value.as_bytes()).await?;
        Ok(())
    }

    /// Gives access to the underlying sink, e.g. to write a nested body.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Closes the writer by writing the final boundary.
    ///
    /// Nothing is written when no part was created.
    pub async fn close(mut self) -> Result<()> {
        if self.has_parts {
            self.writer
                .write_all(format!("\r\n--{}--", self.boundary).as_bytes())
                .await?;
        }
        self.writer.flush().await?;
        Ok(())
    }
}

/// A writer for a single part's body.
pub struct PartWriter<'a, W> {
    writer: &'a mut W,
}

impl<'a, W: AsyncWrite + Unpin> AsyncWrite for PartWriter<'a, W> {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        std::pin::Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

/// Generates a random hexadecimal boundary.
pub fn generate_boundary() -> Result<String> {
    let mut buf = [0u8; 16];
    getrandom::getrandom(&mut buf)
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;

    Ok(buf.iter().map(|b| format!("{:02x}", b)).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::CONTENT_TYPE;

    #[tokio::test]
    async fn test_writer_wire_format() {
        let mut output = Vec::new();
        let mut writer = Writer::with_boundary(&mut output, "b").unwrap();

        writer.write_field("field1", "value1").await.unwrap();

        let mut headers = Headers::new();
        headers.append(CONTENT_TYPE, "text/plain");
        let mut part = writer.create_part(&headers).await.unwrap();
        part.write_all(b"value2").await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "--b\r\n\
Content-Disposition: form-data; name=\"field1\"\r\n\
\r\n\
value1\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
\r\n\
value2\r\n\
--b--"
        );
    }

    #[tokio::test]
    async fn test_writer_without_parts_writes_nothing() {
        let mut output = Vec::new();
        let writer = Writer::new(&mut output).unwrap();
        writer.close().await.unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_boundary_validation() {
        let mut output = Vec::new();
        let mut writer = Writer::new(&mut output).unwrap();

        assert!(writer.set_boundary("simple-boundary".to_string()).is_ok());
        assert_eq!(writer.boundary(), "simple-boundary");

        // Too long
        let long = "a".repeat(71);
        assert!(writer.set_boundary(long).is_err());

        // Empty
        assert!(writer.set_boundary(String::new()).is_err());

        assert!(Writer::with_boundary(Vec::new(), "semi;colon").is_err());
    }

    #[test]
    fn test_content_type() {
        let writer = Writer::with_boundary(Vec::new(), "simple boundary").unwrap();
        assert_eq!(
            writer.content_type("mixed"),
            "multipart/mixed; boundary=\"simple boundary\""
        );
    }

    #[test]
    fn test_generate_boundary() {
        let a = generate_boundary().unwrap();
        let b = generate_boundary().unwrap();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_valid_boundary(&a));
        assert_ne!(a, b);
    }
}
