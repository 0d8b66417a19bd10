//! # Presets
//!
//! A preset is a named rule that rewrites one part of a request: a query
//! parameter, a header, a form body field, or a value inside a JSON body.
//! Presets can be limited to URLs whose host and path contain given
//! substrings, switched off without being deleted, and marked `auto` to run
//! right after a cURL import.

pub mod apply;
pub mod scope;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::{Error, Result};

pub use apply::{apply_presets, ApplyOutcome, DefaultsPrompt, PromptReply, ValuePrompt};
pub use scope::{host_and_path, scope_matches};
pub use store::PresetStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    #[default]
    Kv,
    Jsonpath,
}

/// Which key/value list a `kv` preset writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetTarget {
    #[default]
    Query,
    #[serde(alias = "header")]
    Headers,
    BodyKv,
}

impl Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PresetKind::Kv => "kv",
            PresetKind::Jsonpath => "jsonpath",
        };
        write!(f, "{label}")
    }
}

impl Display for PresetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PresetTarget::Query => "query",
            PresetTarget::Headers => "headers",
            PresetTarget::BodyKv => "body_kv",
        };
        write!(f, "{label}")
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: PresetKind,
    /// Only meaningful for `kv` presets.
    #[serde(default)]
    pub target: PresetTarget,
    /// Key name for `kv`, dotted path for `jsonpath`.
    #[serde(rename = "match", default)]
    pub match_key: String,
    #[serde(default)]
    pub value: String,
    /// Ask for the value at apply time, seeded with `value`.
    #[serde(default)]
    pub prompt: bool,
    #[serde(default)]
    pub scope_host: String,
    #[serde(default)]
    pub scope_path: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub auto: bool,
}

impl Preset {
    pub fn kv(
        name: impl Into<String>,
        target: PresetTarget,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PresetKind::Kv,
            target,
            match_key: key.into(),
            value: value.into(),
            prompt: false,
            scope_host: String::new(),
            scope_path: String::new(),
            enabled: true,
            auto: false,
        }
    }

    pub fn json_path(name: impl Into<String>, path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: PresetKind::Jsonpath,
            ..Self::kv(name, PresetTarget::Query, path, value)
        }
    }

    pub fn with_scope(mut self, host: impl Into<String>, path: impl Into<String>) -> Self {
        self.scope_host = host.into();
        self.scope_path = path.into();
        self
    }

    pub fn with_prompt(mut self) -> Self {
        self.prompt = true;
        self
    }

    pub fn with_auto(mut self) -> Self {
        self.auto = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Trim the identifying fields and reject presets missing a name or a
    /// match key/path.
    pub fn normalized(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        self.match_key = self.match_key.trim().to_string();
        self.scope_host = self.scope_host.trim().to_string();
        self.scope_path = self.scope_path.trim().to_string();

        if self.name.is_empty() {
            return Err(Error::Validation("preset name cannot be empty".into()));
        }
        if self.match_key.is_empty() {
            return Err(Error::Validation(format!(
                "preset `{}` needs a match key or path",
                self.name
            )));
        }
        Ok(self)
    }

    /// One-line description used in listings.
    pub fn summary(&self) -> String {
        let mut flags = Vec::new();
        if !self.enabled {
            flags.push("off");
        }
        if self.auto {
            flags.push("auto");
        }
        if self.prompt {
            flags.push("prompt");
        }
        let host = if self.scope_host.is_empty() { "*" } else { &self.scope_host };
        let path = if self.scope_path.is_empty() { "*" } else { &self.scope_path };
        let target = match self.kind {
            PresetKind::Kv => format!("{}:{}", self.target, self.match_key),
            PresetKind::Jsonpath => format!("json:{}", self.match_key),
        };
        format!(
            "{} [{}] {} = {:?} host={} path={} {}",
            self.name,
            self.kind,
            target,
            self.value,
            host,
            path,
            flags.join(",")
        )
        .trim_end()
        .to_string()
    }
}
