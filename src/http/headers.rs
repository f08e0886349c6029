use std::collections::HashMap;

use crate::http::error::{HeaderError, ParseError};

const CRLF: &[u8] = b"\r\n";

/// Case-insensitive header collection.
///
/// Names are stored lower-cased. Setting a name that already exists folds
/// the new value onto the old one (`"1, 2"`) instead of replacing it, which
/// is how repeated header lines are combined while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses at most one header line from the front of `buf`.
    ///
    /// Returns `(consumed, done)`:
    /// - `(0, false)` when no full line is buffered yet
    /// - `(2, true)` on the blank line that ends the header block
    /// - `(line + 2, false)` after folding one field into the collection
    ///
    /// Values must be UTF-8; obs-text bytes are rejected rather than
    /// replaced, so a stored value is always exactly what was sent.
    pub fn parse(&mut self, buf: &[u8]) -> Result<(usize, bool), ParseError> {
        let Some(idx) = find_crlf(buf) else {
            return Ok((0, false));
        };

        if idx == 0 {
            return Ok((CRLF.len(), true));
        }

        let line = &buf[..idx];
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(ParseError::MalformedHeaderLine)?;

        let raw_name = String::from_utf8_lossy(&line[..colon]);
        // "Host : x" is not allowed; leading whitespace is tolerated
        if raw_name.ends_with(|c: char| c.is_ascii_whitespace()) {
            return Err(ParseError::InvalidHeaderName(raw_name.into_owned()));
        }

        let name = raw_name.trim();
        let value = std::str::from_utf8(&line[colon + 1..])
            .map_err(|_| ParseError::InvalidHeaderValue(name.to_string()))?;
        self.set(name, value)?;

        Ok((idx + CRLF.len(), false))
    }

    /// Adds a value, folding it onto an existing one with `", "`.
    ///
    /// The name must be a token and the value must not contain control
    /// characters other than tab, so nothing stored here can break a
    /// header line when written out.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let (key, value) = validate(name, value)?;
        self.fold(key, value);
        Ok(())
    }

    /// Replaces any existing value outright. Same checks as [`set`](Headers::set).
    pub fn override_value(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let (key, value) = validate(name, value)?;
        self.entries.insert(key, value.to_string());
        Ok(())
    }

    /// For names known at compile time and values built from digits or
    /// other known-safe text.
    pub(crate) fn set_trusted(&mut self, name: &'static str, value: &str) {
        debug_assert!(validate(name, value).is_ok(), "bad trusted header {name}");
        self.fold(normalize(name), value.trim());
    }

    fn fold(&mut self, key: String, value: &str) {
        match self.entries.get_mut(&key) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                self.entries.insert(key, value.to_string());
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&normalize(name))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&normalize(name)).map(|v| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn validate<'v>(name: &str, value: &'v str) -> Result<(String, &'v str), HeaderError> {
    let key = normalize(name);
    if !is_token(&key) {
        return Err(HeaderError::InvalidName(name.to_string()));
    }

    let value = value.trim();
    if value.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
        return Err(HeaderError::InvalidValue { name: key });
    }

    Ok((key, value))
}

/// RFC 9110 `token`: letters, digits and ``!#$%&'*+-.^_`|~``.
pub fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}
