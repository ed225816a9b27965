//! Grammar helpers for MIME tokens, quoted strings and parameter lists.
//!
//! Based on RFC 2045 token definitions and the RFC 2046 boundary alphabet.

/// Maximum boundary length allowed by RFC 2046.
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Reports whether the character is in 'tspecials' as defined by RFC 2045.
///
/// tspecials := "(" / ")" / "<" / ">" / "@" / "," / ";" / ":" / "\" / <"> / "/" / "[" / "]" / "?" / "="
pub fn is_tspecial(c: char) -> bool {
    matches!(c, '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '=')
}

/// Reports whether the character is in 'token' as defined by RFC 2045.
///
/// token := 1*<any (US-ASCII) CHAR except SPACE, CTLs, or tspecials>
pub fn is_token_char(c: char) -> bool {
    c > '\x20' && c < '\x7f' && !is_tspecial(c)
}

/// Reports whether the string is a valid 'token' as defined by RFC 2045.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

/// Reports whether the boundary is 1-70 characters of the RFC 2046 `bchars` set.
///
/// Spaces are allowed anywhere except in the last position.
pub fn is_valid_boundary(boundary: &str) -> bool {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return false;
    }
    let last = boundary.len() - 1;
    boundary.char_indices().all(|(i, ch)| {
        ch.is_ascii_alphanumeric()
            || matches!(ch, '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?')
            || (ch == ' ' && i != last)
    })
}

/// Splits `s` on `sep`, ignoring separators inside double-quoted strings.
///
/// Returns `None` when a quoted string is left open.
pub(crate) fn split_unquoted(s: &str, sep: char) -> Option<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                pieces.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if in_quotes {
        return None;
    }
    pieces.push(&s[start..]);
    Some(pieces)
}

/// Removes surrounding double quotes and backslash escapes from a parameter value.
///
/// Unquoted values are returned unchanged. Returns `None` for a value that
/// opens a quoted string without closing it.
pub(crate) fn unquote(value: &str) -> Option<String> {
    let Some(inner) = value.strip_prefix('"') else {
        return Some(value.to_string());
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next()?),
            '"' => {
                return if chars.as_str().trim().is_empty() {
                    Some(out)
                } else {
                    None
                };
            }
            c => out.push(c),
        }
    }
    None
}

/// Renders a parameter value as a token when possible, otherwise as a quoted string.
pub(crate) fn quote_if_needed(value: &str) -> String {
    if is_token(value) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// Wraps the value in double quotes unless it already starts or ends with one.
pub(crate) fn include_quotes(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    if !value.starts_with('"') {
        quoted.push('"');
    }
    quoted.push_str(value);
    if !value.ends_with('"') || value.len() == 1 {
        quoted.push('"');
    }
    quoted
}
