//! Entity header multi-map and header value helpers.

use crate::grammar::{split_unquoted, unquote};
use crate::media_type::Parameters;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_ID: &str = "Content-Id";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";

/// A case-insensitive header multi-map.
///
/// Lookups ignore case; the spelling and order of insertion are kept for
/// serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first value of the named header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value of the named header, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Reports whether the named header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Appends a value, keeping existing values of the same header.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces all values of the named header with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(pos) => {
                self.entries[pos] = (name.clone(), value);
                let mut i = pos + 1;
                while i < self.entries.len() {
                    if self.entries[i].0.eq_ignore_ascii_case(&name) {
                        self.entries.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Removes every value of the named header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of header lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns the header value without its parameters.
///
/// `application/x-www-form-urlencoded; charset=UTF-8` becomes
/// `application/x-www-form-urlencoded`.
pub fn header_value(value: &str) -> &str {
    value.split(';').next().unwrap_or("").trim()
}

/// Returns the parameters of a header value.
///
/// Lenient: parameters without `=` and values with broken quoting are dropped.
pub fn header_params(value: &str) -> Parameters {
    let mut params = Parameters::new();
    let Some(pieces) = split_unquoted(value, ';') else {
        return params;
    };
    for piece in pieces.into_iter().skip(1) {
        if let Some((name, raw)) = piece.split_once('=') {
            if let Some(v) = unquote(raw.trim()) {
                params.insert(name.trim(), v);
            }
        }
    }
    params
}

/// Extracts the `boundary` parameter of a Content-Type value.
pub fn boundary_param(content_type: &str) -> Option<String> {
    header_params(content_type)
        .get("boundary")
        .filter(|b| !b.is_empty())
        .map(str::to_string)
}
