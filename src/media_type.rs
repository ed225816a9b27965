//! Media type parsing and formatting.
//!
//! Implements the Content-Type grammar
//! `type "/" subtype ["+" suffix] *(";" token "=" (token / quoted-string))`.

use crate::error::{Error, Result};
use crate::grammar::{is_token, quote_if_needed, split_unquoted, unquote};
use std::fmt;
use std::str::FromStr;

/// Primary type shared by all multipart media types.
pub const MULTIPART: &str = "multipart";
/// Primary type of encapsulated messages.
pub const MESSAGE: &str = "message";
/// Default type of a byte-source or live-stream body.
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
/// Default type of a part-list body.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
/// Default type of a text body.
pub const TEXT_PLAIN: &str = "text/plain";
/// Default type of a JSON body.
pub const APPLICATION_JSON: &str = "application/json";
/// Default type of an XML body.
pub const APPLICATION_XML: &str = "application/xml";
/// Type of server-sent event streams.
pub const TEXT_EVENT_STREAM: &str = "text/event-stream";

/// An ordered, case-insensitive parameter map.
///
/// Names are stored lowercase; insertion order is preserved and is the
/// order parameters are rendered in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of the named parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a parameter, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Removes a parameter, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends `; name=value` for every parameter.
    pub(crate) fn write_to(&self, out: &mut String) {
        for (name, value) in self.iter() {
            out.push_str("; ");
            out.push_str(name);
            out.push('=');
            out.push_str(&quote_if_needed(value));
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// A parsed Content-Type value.
///
/// The default value has empty type fields and no parameters, which is the
/// explicit "no type set" state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaType {
    /// Primary type, e.g. `multipart`.
    pub primary_type: String,
    /// Subtype without its structured-syntax suffix, e.g. `problem`.
    pub sub_type: String,
    /// Structured-syntax suffix, e.g. `json` in `problem+json`.
    pub suffix: String,
    /// Parameters in declaration order.
    pub parameters: Parameters,
}

impl MediaType {
    /// Creates a media type without parameters.
    pub fn new(primary_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        let primary_type = primary_type.into().to_ascii_lowercase();
        let (sub_type, suffix) = split_suffix(&sub_type.into().to_ascii_lowercase());
        Self {
            primary_type,
            sub_type,
            suffix,
            parameters: Parameters::new(),
        }
    }

    /// Parses a Content-Type value.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio_mime_entity::MediaType;
    ///
    /// let mt = MediaType::parse("application/test+xml; charset=utf-8").unwrap();
    /// assert_eq!(mt.primary_type, "application");
    /// assert_eq!(mt.sub_type, "test");
    /// assert_eq!(mt.suffix, "xml");
    /// assert_eq!(mt.parameters.get("charset"), Some("utf-8"));
    /// ```
    pub fn parse(v: &str) -> Result<Self> {
        parse_media_type(v)
    }

    /// Parses an optional Content-Type; `None` yields the empty media type.
    pub fn from_optional(v: Option<&str>) -> Result<Self> {
        match v {
            Some(v) => parse_media_type(v),
            None => Ok(Self::default()),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Reports whether no type has been set.
    pub fn is_empty(&self) -> bool {
        self.primary_type.is_empty() && self.sub_type.is_empty()
    }

    /// Returns `primary/sub`, without suffix or parameters.
    ///
    /// Returns `None` for the empty media type.
    pub fn base_type(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!("{}/{}", self.primary_type, self.sub_type))
    }

    /// Reports whether the type is `multipart/*`.
    pub fn is_multipart(&self) -> bool {
        self.primary_type == MULTIPART
    }

    /// Reports whether the type is composite (`multipart/*` or `message/*`).
    pub fn is_composite(&self) -> bool {
        self.is_multipart() || self.primary_type == MESSAGE
    }

    /// Reports whether the base type equals `base`, ignoring case.
    pub fn is(&self, base: &str) -> bool {
        match base.split_once('/') {
            Some((p, s)) => {
                self.primary_type.eq_ignore_ascii_case(p) && self.sub_type.eq_ignore_ascii_case(s)
            }
            None => false,
        }
    }

    /// Returns the `boundary` parameter.
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").filter(|b| !b.is_empty())
    }

    /// Returns the `charset` parameter.
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").filter(|c| !c.is_empty())
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_media_type(self))
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_media_type(s)
    }
}

fn split_suffix(sub: &str) -> (String, String) {
    match sub.rsplit_once('+') {
        Some((sub, suffix)) => (sub.to_string(), suffix.to_string()),
        None => (sub.to_string(), String::new()),
    }
}

/// Parses a Content-Type value into a [`MediaType`].
///
/// Type names and parameter names are converted to lowercase; parameter
/// values keep their case and lose their surrounding quotes.
pub fn parse_media_type(v: &str) -> Result<MediaType> {
    let pieces = split_unquoted(v, ';')
        .ok_or_else(|| Error::InvalidContentType(format!("unbalanced quotes in {v:?}")))?;
    let (base, params) = pieces
        .split_first()
        .ok_or_else(|| Error::InvalidContentType("empty content type".to_string()))?;

    let base = base.trim().to_ascii_lowercase();
    let (primary, sub) = base
        .split_once('/')
        .ok_or_else(|| Error::InvalidContentType(format!("unable to find a sub type in {v:?}")))?;
    let (primary, sub) = (primary.trim(), sub.trim());
    if !is_token(primary) {
        return Err(Error::InvalidContentType(format!("invalid primary type in {v:?}")));
    }
    if !is_token(sub) {
        return Err(Error::InvalidContentType(format!("invalid sub type in {v:?}")));
    }

    let (sub_type, suffix) = split_suffix(sub);
    let mut media_type = MediaType {
        primary_type: primary.to_string(),
        sub_type,
        suffix,
        parameters: Parameters::new(),
    };

    for param in params {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        let (name, value) = param.split_once('=').ok_or_else(|| {
            Error::InvalidContentType(format!("parameter {param:?} has no value"))
        })?;
        let name = name.trim();
        if !is_token(name) {
            return Err(Error::InvalidContentType(format!("invalid parameter name {name:?}")));
        }
        let value = unquote(value.trim()).ok_or_else(|| {
            Error::InvalidContentType(format!("unbalanced quotes in parameter {name:?}"))
        })?;
        media_type.parameters.insert(name, value);
    }

    Ok(media_type)
}

/// Serializes a media type as `primary/sub[+suffix]; k1=v1; k2=v2`.
///
/// The empty media type renders as an empty string.
pub fn format_media_type(media_type: &MediaType) -> String {
    if media_type.is_empty() {
        return String::new();
    }
    let mut result = format!("{}/{}", media_type.primary_type, media_type.sub_type);
    if !media_type.suffix.is_empty() {
        result.push('+');
        result.push_str(&media_type.suffix);
    }
    media_type.parameters.write_to(&mut result);
    result
}

/// Reports whether `content_type` parses as a media type.
pub fn is_valid_content_type(content_type: &str) -> bool {
    parse_media_type(content_type).is_ok()
}
