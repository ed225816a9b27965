//! Content-Disposition parsing and formatting.

use crate::error::{Error, Result};
use crate::grammar::{include_quotes, split_unquoted, unquote};
use crate::media_type::Parameters;
use std::fmt;

/// Disposition type used for parts of a `multipart/form-data` body.
pub const FORM_DATA: &str = "form-data";

/// A parsed Content-Disposition value.
///
/// `name` and `filename` are lifted out of the parameter map; every other
/// parameter stays in `parameters`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    /// e.g. `form-data`, `attachment`, `inline`.
    pub disposition_type: String,
    pub name: Option<String>,
    pub filename: Option<String>,
    pub parameters: Parameters,
}

impl ContentDisposition {
    /// Creates a disposition of the given type.
    pub fn new(disposition_type: impl Into<String>) -> Self {
        Self {
            disposition_type: disposition_type.into(),
            ..Self::default()
        }
    }

    /// Creates a `form-data` disposition for the named field.
    pub fn form_data(name: impl Into<String>) -> Self {
        Self::new(FORM_DATA).with_name(name)
    }

    /// Sets the `name` parameter.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the `filename` parameter.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Adds any other parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Parses a Content-Disposition header value.
    pub fn parse(v: &str) -> Result<Self> {
        parse_content_disposition(v)
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_content_disposition(self))
    }
}

/// Parses `disposition-type *(";" name "=" value)`.
///
/// Parameters without a value are dropped.
pub fn parse_content_disposition(v: &str) -> Result<ContentDisposition> {
    let pieces = split_unquoted(v, ';').ok_or_else(|| {
        Error::InvalidContentType(format!("unbalanced quotes in content disposition {v:?}"))
    })?;

    let mut disposition = ContentDisposition::default();
    let mut pieces = pieces.into_iter();
    if let Some(first) = pieces.next() {
        disposition.disposition_type = first.trim().to_ascii_lowercase();
    }

    for param in pieces {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = unquote(value.trim()).ok_or_else(|| {
            Error::InvalidContentType(format!("unbalanced quotes in parameter {name:?}"))
        })?;
        match name.as_str() {
            "name" => disposition.name = Some(value),
            "filename" => disposition.filename = Some(value),
            _ => disposition.parameters.insert(name, value),
        }
    }

    Ok(disposition)
}

/// Serializes a disposition as `type; name="..."; filename="..."; k=v`.
///
/// Empty fields are omitted. An empty disposition type renders as an empty
/// string, since parameters cannot stand on their own.
pub fn format_content_disposition(disposition: &ContentDisposition) -> String {
    if disposition.disposition_type.is_empty() {
        return String::new();
    }
    let mut out = disposition.disposition_type.clone();
    if let Some(name) = disposition.name.as_deref().filter(|n| !n.is_empty()) {
        out.push_str("; name=");
        out.push_str(&include_quotes(name));
    }
    if let Some(filename) = disposition.filename.as_deref().filter(|f| !f.is_empty()) {
        out.push_str("; filename=");
        out.push_str(&include_quotes(filename));
    }
    disposition.parameters.write_to(&mut out);
    out
}
