use serde_json::Value;

use crate::http::request::{BodyMode, RequestDocument};
use crate::jsonpath::set_json_path;
use crate::kv;

use super::scope::scope_matches;
use super::{Preset, PresetKind, PresetTarget};

/// Answer to an interactive value prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    Value(String),
    Canceled,
}

/// Supplies values for presets marked `prompt`. Called once per such preset,
/// in store order, before that preset is applied.
pub trait ValuePrompt {
    fn prompt(&mut self, preset: &Preset, default: &str) -> PromptReply;
}

impl<F> ValuePrompt for F
where
    F: FnMut(&Preset, &str) -> PromptReply,
{
    fn prompt(&mut self, preset: &Preset, default: &str) -> PromptReply {
        self(preset, default)
    }
}

/// Accepts every stored value without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsPrompt;

impl ValuePrompt for DefaultsPrompt {
    fn prompt(&mut self, _preset: &Preset, default: &str) -> PromptReply {
        PromptReply::Value(default.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub document: RequestDocument,
    /// Presets left after the enabled/auto/scope filters.
    pub matched: usize,
    pub hits: usize,
    /// Presets whose prompt was declined.
    pub canceled: usize,
    /// Presets that did not fit the current body (wrong mode, unparsable JSON).
    pub skipped: usize,
}

impl ApplyOutcome {
    /// Nothing survived filtering; the document is untouched.
    pub fn is_no_match(&self) -> bool {
        self.matched == 0
    }
}

/// Run `presets` against `document`, in the order given.
///
/// Disabled presets, non-auto presets when `only_auto` is set, and presets
/// whose scope does not match the URL are dropped first. Each remaining
/// preset either changes the document (a hit), is declined at its prompt, or
/// does not fit the body and is skipped. None of these stop the batch.
pub fn apply_presets<P>(
    presets: &[Preset],
    document: &RequestDocument,
    prompt: &mut P,
    only_auto: bool,
) -> ApplyOutcome
where
    P: ValuePrompt + ?Sized,
{
    let url = document.url.trim();
    let eligible: Vec<&Preset> = presets
        .iter()
        .filter(|preset| preset.enabled)
        .filter(|preset| !only_auto || preset.auto)
        .filter(|preset| scope_matches(preset, url))
        .collect();

    let mut outcome = ApplyOutcome {
        document: document.clone(),
        matched: eligible.len(),
        hits: 0,
        canceled: 0,
        skipped: 0,
    };

    if eligible.is_empty() {
        tracing::debug!(url, only_auto, "no preset matched");
        return outcome;
    }

    let mut query = document.effective_query();
    let mut headers = document.effective_headers();
    let mut body = document.body_text.clone();

    for preset in eligible {
        let value = if preset.prompt {
            match prompt.prompt(preset, &preset.value) {
                PromptReply::Value(value) => value,
                PromptReply::Canceled => {
                    tracing::debug!(preset = %preset.name, "prompt declined");
                    outcome.canceled += 1;
                    continue;
                }
            }
        } else {
            preset.value.clone()
        };

        let hit = match (preset.kind, preset.target) {
            (PresetKind::Kv, PresetTarget::Query) => {
                kv::upsert(&mut query, &preset.match_key, &value);
                true
            }
            (PresetKind::Kv, PresetTarget::Headers) => {
                kv::upsert(&mut headers, &preset.match_key, &value);
                true
            }
            (PresetKind::Kv, PresetTarget::BodyKv) => {
                if document.body_mode.is_kv_lines() {
                    body = upsert_body_line(&body, &preset.match_key, &value);
                    true
                } else {
                    false
                }
            }
            (PresetKind::Jsonpath, _) => match document.body_mode {
                BodyMode::Json => match set_body_json_path(&body, &preset.match_key, value) {
                    Some(updated) => {
                        body = updated;
                        true
                    }
                    None => false,
                },
                _ => false,
            },
        };

        if hit {
            outcome.hits += 1;
        } else {
            tracing::debug!(preset = %preset.name, body_mode = %document.body_mode, "preset skipped");
            outcome.skipped += 1;
        }
    }

    outcome.document.set_query_pairs(query);
    outcome.document.set_header_pairs(headers);
    outcome.document.body_text = body;

    tracing::info!(
        matched = outcome.matched,
        hits = outcome.hits,
        canceled = outcome.canceled,
        skipped = outcome.skipped,
        "applied presets"
    );
    outcome
}

/// Replace the value of every `key=...` line, or append one.
fn upsert_body_line(body: &str, key: &str, value: &str) -> String {
    let mut found = false;
    let mut lines: Vec<String> = if body.is_empty() {
        Vec::new()
    } else {
        body.split('\n')
            .map(|line| match line.trim().split_once('=') {
                Some((existing, _)) if existing.trim() == key => {
                    found = true;
                    format!("{key}={value}")
                }
                _ => line.to_string(),
            })
            .collect()
    };

    if !found {
        lines.push(format!("{key}={value}"));
    }
    lines.join("\n")
}

/// Blank bodies count as `{}`; bodies that are not JSON are left alone.
fn set_body_json_path(body: &str, path: &str, value: String) -> Option<String> {
    let source = if body.trim().is_empty() { "{}" } else { body };
    let mut root: Value = serde_json::from_str(source).ok()?;
    if !set_json_path(&mut root, path, Value::String(value)) {
        return None;
    }
    serde_json::to_string_pretty(&root).ok()
}
