use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::kv::{self, KvFormat, Pair};

use super::method::HttpMethod;

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyMode {
    #[default]
    None,
    Json,
    FormUrlencoded,
    Multipart,
    Raw,
}

impl BodyMode {
    pub const ALL: [BodyMode; 5] = [
        BodyMode::None,
        BodyMode::Json,
        BodyMode::FormUrlencoded,
        BodyMode::Multipart,
        BodyMode::Raw,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BodyMode::None => "none",
            BodyMode::Json => "json",
            BodyMode::FormUrlencoded => "form-urlencoded",
            BodyMode::Multipart => "multipart",
            BodyMode::Raw => "raw",
        }
    }

    /// Whether the body text is a list of `key=value` lines.
    pub fn is_kv_lines(self) -> bool {
        matches!(self, BodyMode::FormUrlencoded | BodyMode::Multipart)
    }
}

impl Display for BodyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BodyMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        BodyMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("Unknown body mode `{value}`"))
    }
}

/// Connection-level knobs that travel with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    pub timeout_secs: u64,
    pub allow_redirects: bool,
    pub verify_tls: bool,
    pub proxy: String,
    /// `user:password`
    pub basic_auth: String,
    pub cookies: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            allow_redirects: true,
            verify_tls: true,
            proxy: String::new(),
            basic_auth: String::new(),
            cookies: String::new(),
        }
    }
}

/// The request under construction.
///
/// Query and header rows are mirrored as flat text. The setters keep the two
/// forms reconciled: whichever side is written becomes authoritative and the
/// other is regenerated from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDocument {
    pub method: HttpMethod,
    pub url: String,
    query_pairs: Vec<Pair>,
    query_text: String,
    header_pairs: Vec<Pair>,
    header_text: String,
    pub body_mode: BodyMode,
    pub body_text: String,
    #[serde(flatten)]
    pub options: TransportOptions,
}

impl RequestDocument {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn query_pairs(&self) -> &[Pair] {
        &self.query_pairs
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn header_pairs(&self) -> &[Pair] {
        &self.header_pairs
    }

    pub fn header_text(&self) -> &str {
        &self.header_text
    }

    pub fn set_query_pairs(&mut self, pairs: Vec<Pair>) {
        self.query_text = kv::serialize(&pairs, KvFormat::Kv);
        self.query_pairs = pairs;
    }

    pub fn set_query_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.query_pairs = kv::parse(&text, KvFormat::Kv);
        self.query_text = text;
    }

    pub fn set_header_pairs(&mut self, pairs: Vec<Pair>) {
        self.header_text = kv::serialize(&pairs, KvFormat::Headers);
        self.header_pairs = pairs;
    }

    pub fn set_header_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.header_pairs = kv::parse(&text, KvFormat::Headers);
        self.header_text = text;
    }

    /// Regenerate both text blocks from the rows.
    pub fn resync_text(&mut self) {
        self.query_text = kv::serialize(&self.query_pairs, KvFormat::Kv);
        self.header_text = kv::serialize(&self.header_pairs, KvFormat::Headers);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_pairs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Query rows with a non-blank key, in order.
    pub fn effective_query(&self) -> Vec<Pair> {
        non_blank(&self.query_pairs)
    }

    /// Header rows with a non-blank key, in order.
    pub fn effective_headers(&self) -> Vec<Pair> {
        non_blank(&self.header_pairs)
    }

    /// URL with the query rows appended as `k=v&...`, unencoded.
    pub fn url_with_query(&self) -> String {
        let url = self.url.trim();
        let query = self
            .effective_query()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        if query.is_empty() {
            return url.to_string();
        }
        let joiner = if url.contains('?') { '&' } else { '?' };
        format!("{url}{joiner}{query}")
    }

    /// Body lines as pairs, for the form and multipart modes.
    pub fn body_pairs(&self) -> Vec<Pair> {
        kv::parse(&self.body_text, KvFormat::Kv)
            .into_iter()
            .filter(|(key, _)| !key.is_empty())
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn non_blank(pairs: &[Pair]) -> Vec<Pair> {
    pairs
        .iter()
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim().to_string(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair(k: &str, v: &str) -> Pair {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn defaults_match_a_fresh_editor() {
        let doc = RequestDocument::default();
        assert_eq!(doc.method, HttpMethod::Get);
        assert_eq!(doc.body_mode, BodyMode::None);
        assert_eq!(doc.options.timeout_secs, 20);
        assert!(doc.options.allow_redirects);
        assert!(doc.options.verify_tls);
    }

    #[test]
    fn pair_edits_regenerate_text() {
        let mut doc = RequestDocument::default();
        doc.set_query_pairs(vec![pair("a", "1"), pair("", "dropped"), pair("b", "2")]);
        assert_eq!(doc.query_text(), "a=1\nb=2");

        doc.set_header_pairs(vec![pair("Accept", "*/*")]);
        assert_eq!(doc.header_text(), "Accept: */*");
    }

    #[test]
    fn text_edits_regenerate_pairs() {
        let mut doc = RequestDocument::default();
        doc.set_header_text("Host: example.com\nnot a header\nX-A: 1");
        assert_eq!(doc.header_pairs(), &[pair("Host", "example.com"), pair("X-A", "1")]);
        assert_eq!(doc.header_text(), "Host: example.com\nnot a header\nX-A: 1");

        doc.resync_text();
        assert_eq!(doc.header_text(), "Host: example.com\nX-A: 1");
    }

    #[test]
    fn url_with_query_appends_rows() {
        let mut doc = RequestDocument::new(HttpMethod::Get, "https://api.example.com/v1?x=1");
        assert_eq!(doc.url_with_query(), "https://api.example.com/v1?x=1");
        doc.set_query_pairs(vec![pair("a", "1"), pair("b", "")]);
        assert_eq!(doc.url_with_query(), "https://api.example.com/v1?x=1&a=1&b=");

        doc.url = "https://api.example.com/v1".into();
        assert_eq!(doc.url_with_query(), "https://api.example.com/v1?a=1&b=");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut doc = RequestDocument::default();
        doc.set_header_text("content-type: application/json");
        assert_eq!(doc.header("Content-Type"), Some("application/json"));
        assert_eq!(doc.header("Cookie"), None);
    }

    #[test]
    fn serializes_body_mode_kebab_case() {
        let mut doc = RequestDocument::default();
        doc.body_mode = BodyMode::FormUrlencoded;
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["body_mode"], "form-urlencoded");
        assert_eq!(json["timeout_secs"], 20);

        let back: RequestDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut doc = RequestDocument::new(HttpMethod::Post, "https://x.test");
        doc.body_text = "abc".into();
        doc.reset();
        assert_eq!(doc, RequestDocument::default());
    }
}
