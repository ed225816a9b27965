//! MIME entity bodies with lazy multipart decoding, re-encoding and
//! streaming output, async-first on tokio.
//!
//! This crate provides:
//! - An [`Entity`] whose body is exactly one of a byte source, a materialized
//!   value, a list of body parts, or a live chunk stream
//! - Media type and Content-Disposition parsing and formatting (RFC 2045, RFC 2183)
//! - Multipart decoding with memory-to-disk spillover, and encoding (RFC 2046)
//! - Streaming a body to an async sink without materializing it
//! - Base64 encoding and decoding with charset support
//!
//! # Example
//!
//! ```no_run
//! use tokio_mime_entity::{ByteSource, Entity};
//!
//! # async fn example() -> tokio_mime_entity::Result<()> {
//! let wire = "--b\r\nContent-Type: text/plain\r\n\r\nhello\r\n--b--";
//! let mut entity = Entity::new();
//! entity.set_byte_source(ByteSource::from_bytes(wire), Some("multipart/mixed; boundary=b"))?;
//!
//! for part in entity.parts().await? {
//!     println!("{}: {}", part.content_type(), part.read_text().await?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod charset;
pub mod disposition;
pub mod encoding;
pub mod entity;
pub mod error;
pub mod grammar;
pub mod header;
pub mod media_type;
pub mod multipart;
pub mod stream;

// Re-export commonly used types
pub use body::{Body, BodyKind, ByteSource, DataSource, DataValue, LiveStream};
pub use disposition::{format_content_disposition, parse_content_disposition, ContentDisposition};
pub use entity::Entity;
pub use error::{Error, Result};
pub use header::{boundary_param, header_params, header_value, Headers};
pub use media_type::{format_media_type, is_valid_content_type, parse_media_type, MediaType, Parameters};
pub use multipart::DecoderConfig;
pub use stream::write_body;
