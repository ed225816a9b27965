//! Multipart MIME decoding and encoding.
//!
//! [`Reader`] and [`Writer`] work on the wire format directly; [`decode`],
//! [`parse_body`] and [`serialize`] map it to and from [`Entity`] trees.
//!
//! [`Entity`]: crate::Entity

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod reader;
pub mod writer;

pub use config::DecoderConfig;
pub use decoder::{decode, parse_body};
pub use encoder::serialize;
pub use reader::{RawPart, Reader};
pub use writer::{generate_boundary, PartWriter, Writer};
