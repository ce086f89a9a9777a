//! Per-run formatting state.
//!
//! [`FormatContext`] replaces implicit formatter instance state with an
//! explicit context object: it is created fresh for each capture run,
//! threaded through every resolution call, and discarded when the run ends.
//! Two concurrent runs therefore cannot observe each other's values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

/// Namespace prefix separating field lookups from ordinary variables.
///
/// `{{FIELD:title}}` and `{{VALUE:title}}` must cache independently.
const FIELD_PREFIX: &str = "FIELD:";

/// A value resolved for a variable during one capture run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VariableValue {
    /// Plain text, the common case
    Text(String),
    /// A value destined to become a YAML sequence in frontmatter
    List(Vec<String>),
    /// A parsed date (from a date-variable token)
    Date(NaiveDate),
    /// Arbitrary structured data produced by a macro or script
    Structured(serde_json::Value),
}

impl VariableValue {
    /// Render the value for inline substitution into body text.
    pub fn as_text(&self) -> String {
        match self {
            VariableValue::Text(s) => s.clone(),
            VariableValue::List(items) => items.join(", "),
            VariableValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            VariableValue::Structured(v) => match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }

    /// Convert to a YAML value for the frontmatter-writer collaborator.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            VariableValue::Text(s) => serde_yaml::Value::String(s.clone()),
            VariableValue::List(items) => serde_yaml::Value::Sequence(
                items
                    .iter()
                    .map(|s| serde_yaml::Value::String(s.clone()))
                    .collect(),
            ),
            VariableValue::Date(d) => {
                serde_yaml::Value::String(d.format("%Y-%m-%d").to_string())
            }
            VariableValue::Structured(v) => {
                serde_yaml::to_value(v).unwrap_or(serde_yaml::Value::Null)
            }
        }
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::Text(s)
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::Text(s.to_string())
    }
}

/// How a `@list` hint asked a value to be split into a sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListHint {
    pub delimiter: char,
}

impl Default for ListHint {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

/// Split raw input into list items per a hint.
///
/// Accepts leading-dash bullet lists or delimiter-separated text.
pub fn split_list_input(input: &str, hint: ListHint) -> Vec<String> {
    let is_bullet_list = input.contains('\n')
        && input
            .lines()
            .filter(|l| !l.trim().is_empty())
            .all(|l| l.trim_start().starts_with('-'));

    let items: Vec<String> = if is_bullet_list {
        input
            .lines()
            .filter_map(|l| l.trim_start().strip_prefix('-'))
            .map(|s| s.trim().to_string())
            .collect()
    } else {
        input
            .split(hint.delimiter)
            .map(|s| s.trim().to_string())
            .collect()
    };

    items.into_iter().filter(|s| !s.is_empty()).collect()
}

/// The host context a format run may consult: the document the user is
/// editing, their selection, and (for cursor placement) the caret offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveDocument {
    pub path: std::path::PathBuf,
    pub selection: Option<String>,
    pub cursor_offset: Option<usize>,
}

/// Per-run variable store with memoization semantics.
///
/// Once a name is resolved, subsequent references return the cached value
/// without re-prompting. The anonymous-value slot and the engine title
/// slot are separate from the named variable map so a script-provided
/// `title` variable never collides with the engine-assigned display title.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    variables: HashMap<String, VariableValue>,
    anonymous: Option<String>,
    title: Option<String>,
    list_hints: HashMap<String, ListHint>,
}

impl FormatContext {
    /// Create an empty context for a new run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a field lookup, kept apart from plain variables.
    pub fn field_key(name: &str) -> String {
        let mut key = String::with_capacity(FIELD_PREFIX.len() + name.len());
        let _ = write!(key, "{FIELD_PREFIX}{name}");
        key
    }

    /// Look up a resolved variable.
    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.variables.get(name)
    }

    /// Whether a variable has been resolved this run.
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Seed or overwrite a variable. Scripts and macros write through this.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.variables.insert(name.into(), value.into());
    }

    /// The anonymous `{{VALUE}}` slot.
    pub fn anonymous(&self) -> Option<&str> {
        self.anonymous.as_deref()
    }

    pub fn set_anonymous(&mut self, value: impl Into<String>) {
        self.anonymous = Some(value.into());
    }

    /// The engine-assigned display title (usually the destination file's
    /// basename). Independent from any `title` variable.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Record that a variable carries a `@list` hint for the structured
    /// frontmatter post-processing step.
    pub fn record_list_hint(&mut self, name: impl Into<String>, hint: ListHint) {
        self.list_hints.insert(name.into(), hint);
    }

    pub fn list_hints(&self) -> &HashMap<String, ListHint> {
        &self.list_hints
    }

    /// All resolved variables, e.g. for handing to a macro sandbox.
    pub fn variables(&self) -> &HashMap<String, VariableValue> {
        &self.variables
    }

    /// Drop all run state.
    pub fn clear(&mut self) {
        self.variables.clear();
        self.anonymous = None;
        self.title = None;
        self.list_hints.clear();
    }
}
