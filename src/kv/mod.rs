//! # Key/Value Text Conversion
//!
//! Query parameters and headers are edited either as rows of pairs or as a
//! flat block of text. This module converts between the two.
//!
//! - `KvFormat::Kv`: one `key=value` per line. A line without `=` is a key
//!   with an empty value.
//! - `KvFormat::Headers`: one `Key: value` per line, split at the first
//!   colon. Lines without a colon are dropped.
//!
//! Blank lines and `#` comments are ignored. Parsing never fails.

/// A single key/value row. Keys need not be unique.
pub type Pair = (String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvFormat {
    Kv,
    Headers,
}

impl KvFormat {
    fn separator(self) -> char {
        match self {
            KvFormat::Kv => '=',
            KvFormat::Headers => ':',
        }
    }
}

/// Parse flat text into pairs, silently dropping lines that do not fit.
pub fn parse(text: &str, format: KvFormat) -> Vec<Pair> {
    let mut pairs = Vec::new();

    for line in text.lines() {
        let raw = line.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        match raw.split_once(format.separator()) {
            Some((key, value)) => pairs.push((key.trim().to_string(), value.trim().to_string())),
            None if format == KvFormat::Kv => pairs.push((raw.to_string(), String::new())),
            None => {}
        }
    }

    pairs
}

/// Render pairs as flat text, one line per pair. Pairs with a blank key are
/// skipped.
pub fn serialize(pairs: &[Pair], format: KvFormat) -> String {
    pairs
        .iter()
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| match format {
            KvFormat::Kv => format!("{key}={value}"),
            KvFormat::Headers => format!("{key}: {value}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Set `key` to `value`: every row with that key is updated in place, or a new
/// row is appended when none exists.
pub fn upsert(pairs: &mut Vec<Pair>, key: &str, value: &str) {
    let mut found = false;
    for (existing_key, existing_value) in pairs.iter_mut() {
        if existing_key == key {
            *existing_value = value.to_string();
            found = true;
        }
    }

    if !found {
        pairs.push((key.to_string(), value.to_string()));
    }
}

/// Look up the first value stored under `key`.
pub fn get<'a>(pairs: &'a [Pair], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(existing_key, _)| existing_key == key)
        .map(|(_, value)| value.as_str())
}
