use serde::{Deserialize, Serialize};

/// What came back from a send, trimmed for display and storage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSummary {
    pub ok: bool,
    pub status_code: u16,
    pub reason: String,
    pub final_url: String,
    pub elapsed_ms: u64,
    pub body_len: u64,
    pub content_type: String,
    pub headers_text: String,
    /// Body preview; may be cut short, see `truncated`.
    pub body_text: String,
    pub truncated: bool,
    /// Key into the download store for the raw bytes.
    pub download_id: Option<String>,
}

impl ResponseSummary {
    pub fn status_line(&self) -> String {
        format!("{} {}", self.status_code, self.reason).trim().to_string()
    }

    /// Copy with the body preview capped at `max_chars` characters.
    pub fn capped(&self, max_chars: usize) -> Self {
        let mut capped = self.clone();
        if let Some((byte_index, _)) = capped.body_text.char_indices().nth(max_chars) {
            capped.body_text.truncate(byte_index);
        }
        capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_counts_characters_not_bytes() {
        let response = ResponseSummary {
            body_text: "héllo wörld".into(),
            ..ResponseSummary::default()
        };
        assert_eq!(response.capped(5).body_text, "héllo");
        assert_eq!(response.capped(100).body_text, "héllo wörld");
    }

    #[test]
    fn status_line_without_reason() {
        let response = ResponseSummary {
            status_code: 204,
            ..ResponseSummary::default()
        };
        assert_eq!(response.status_line(), "204");
    }
}
