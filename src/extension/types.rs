//! Type definitions for the extension system
//!
//! Requests, result items and module metadata. Result items and actions are
//! opaque to the manager: modules build them, the host renders them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Load state of a module
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display, strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModuleState {
    Unloaded,
    Loaded,
}

/// Attributes a module may declare, as probed by the runtime at load time
///
/// Everything is optional: presence or absence is recorded, and the module
/// decides at load time whether what it found is enough to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleAttributes {
    pub api_version: Option<u32>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub trigger: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    /// Names of the callables the module provides (`handleQuery`, `initialize`, `finalize`)
    pub callables: Vec<String>,
}

impl ModuleAttributes {
    pub fn provides(&self, callable: &str) -> bool {
        self.callables.iter().any(|c| c == callable)
    }
}

/// Metadata of a module that has loaded at least once
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleMetadata {
    pub name: String,
    pub version: String,
    pub trigger: String,
    pub author: String,
    pub description: String,
    pub dependencies: Vec<String>,
}

impl ModuleMetadata {
    /// Fill in defaults for everything the module did not declare
    pub fn from_attributes(id: &str, attributes: &ModuleAttributes) -> Self {
        Self {
            name: attributes
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| id.to_string()),
            version: attributes.version.clone().unwrap_or_default(),
            trigger: attributes.trigger.clone().unwrap_or_default(),
            author: attributes.author.clone().unwrap_or_default(),
            description: attributes.description.clone().unwrap_or_default(),
            dependencies: attributes.dependencies.clone(),
        }
    }
}

/// Point-in-time view of a module for listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSummary {
    pub id: String,
    pub path: PathBuf,
    pub name: String,
    pub trigger: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub state: ModuleState,
    pub enabled: bool,
    pub last_error: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Alert,
    Notification,
    #[default]
    Normal,
}

/// Something the user can do with a result item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Copy text to the clipboard
    Clip { text: String, clipboard_text: String },
    /// Open a URL
    Url { text: String, url: String },
    /// Run a process
    Proc {
        text: String,
        commandline: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
    },
    /// Run a command in a terminal
    Term {
        text: String,
        commandline: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default = "default_shell")]
        shell: bool,
    },
}

fn default_shell() -> bool {
    true
}

impl Action {
    pub fn clip(text: impl Into<String>, clipboard_text: impl Into<String>) -> Self {
        Action::Clip {
            text: text.into(),
            clipboard_text: clipboard_text.into(),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Action::Url {
            text: text.into(),
            url: url.into(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Action::Clip { text, .. }
            | Action::Url { text, .. }
            | Action::Proc { text, .. }
            | Action::Term { text, .. } => text,
        }
    }
}

/// A result item produced by a module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultItem {
    pub id: String,
    pub icon: String,
    pub text: String,
    pub subtext: String,
    pub completion: String,
    pub urgency: Urgency,
    pub actions: Vec<Action>,
}

impl ResultItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_subtext(mut self, subtext: impl Into<String>) -> Self {
        self.subtext = subtext.into();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// An incoming request, mutated in place by the modules that handle it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    raw_text: String,
    trigger: String,
    valid: bool,
    results: Vec<ResultItem>,
}

impl Query {
    /// An untriggered request; only passive modules see it
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }

    /// A request whose input started with `trigger`
    pub fn triggered(trigger: impl Into<String>, text: &str) -> Self {
        let trigger = trigger.into();
        Self {
            raw_text: format!("{}{}", trigger, text),
            trigger,
            ..Default::default()
        }
    }

    /// Match raw input against registered triggers, longest match first
    pub fn from_input<'a>(raw_text: &str, triggers: impl IntoIterator<Item = &'a String>) -> Self {
        let matched = triggers
            .into_iter()
            .filter(|t| !t.is_empty() && raw_text.starts_with(t.as_str()))
            .max_by_key(|t| t.len());

        match matched {
            Some(trigger) => Self {
                raw_text: raw_text.to_string(),
                trigger: trigger.clone(),
                ..Default::default()
            },
            None => Self::new(raw_text),
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Input with the matched trigger removed
    pub fn text(&self) -> &str {
        self.raw_text
            .strip_prefix(self.trigger.as_str())
            .unwrap_or(&self.raw_text)
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn is_triggered(&self) -> bool {
        !self.trigger.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn add_item(&mut self, item: ResultItem) {
        self.results.push(item);
    }

    pub fn add_items(&mut self, items: impl IntoIterator<Item = ResultItem>) {
        self.results.extend(items);
    }

    pub fn results(&self) -> &[ResultItem] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ResultItem> {
        self.results
    }
}
