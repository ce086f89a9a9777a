//! Token grammar for format strings.
//!
//! One compiled pattern per token kind, matched case-insensitively.
//! Malformed token syntax never raises here: text that fails to match a
//! pattern simply passes through untouched, which keeps live-preview
//! typing safe.

use crate::case::CaseStyle;
use quickcapture_core::ListHint;
use regex::Regex;
use std::sync::LazyLock;

/// `{{DATE}}`, `{{DATE:<fmt>}}`, optional `+N`/`-N` day offset
pub static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{DATE(?::([^}\n\r]+?))?([+-]\d+)?\}\}").unwrap());

/// `{{VALUE}}` / `{{NAME}}` with optional spec and modifiers
pub static VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{(?:VALUE|NAME)(?::([^}\n\r]+))?\}\}").unwrap());

/// `{{FIELD:<name>}}`, cached in its own namespace
pub static FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{FIELD:([^}\n\r]+)\}\}").unwrap());

/// `{{VDATE:<name>,<fmt>}}` with optional `|<default>`
pub static VDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{VDATE:([^,}\n\r]+),([^}|\n\r]+?)(?:\|([^}\n\r]+))?\}\}").unwrap()
});

/// `{{SELECTED}}` - the current editor selection
pub static SELECTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{SELECTED\}\}").unwrap());

/// `{{MVALUE}}` - interactive math evaluator
pub static MVALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\{\{MVALUE\}\}").unwrap());

/// `{{MACRO:<name>}}`
pub static MACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{MACRO:([^}\n\r]+)\}\}").unwrap());

/// `{{TEMPLATE:<path>}}` - splice another template, fully expanded
pub static TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{TEMPLATE:([^}\n\r]+)\}\}").unwrap());

/// `{{LINKCURRENT}}` - wikilink to the active file
pub static LINKCURRENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{LINKCURRENT\}\}").unwrap());

/// `{{FILENAMECURRENT}}` - basename of the active file
pub static FILENAMECURRENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{FILENAMECURRENT\}\}").unwrap());

/// `{{TITLE}}` - the engine-assigned display title
pub static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\{\{TITLE\}\}").unwrap());

/// `{{RANDOM:<len>}}` - alphanumeric string, length 1-100.
/// A non-numeric length fails the match and passes through untouched.
pub static RANDOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{RANDOM:(\d+)\}\}").unwrap());

/// Fenced inline-script block with the `capture` info string
pub static INLINE_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*capture[ \t]*\n(.*?)```\n?").unwrap());

/// `@list` suffix with optional custom delimiter
static LIST_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@list(?:\(delimiter=(.)\))?\s*$").unwrap());

// Fast pre-filter: every brace token starts with this
#[inline]
pub fn has_tokens(content: &str) -> bool {
    content.contains("{{") || content.contains("```")
}

/// Parsed spec of a `{{VALUE:...}}` / `{{FIELD:...}}` token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSpec {
    /// Raw spec text, used as the per-run cache key for suggestion lists
    pub raw: String,
    /// Variable name or comma-separated suggestion values
    pub options: Vec<String>,
    /// Parallel display labels from `|text:...`
    pub labels: Option<Vec<String>>,
    /// Pre-filled default from `|default:...`
    pub default: Option<String>,
    /// `|custom` - free text allowed alongside the suggestion list
    pub allow_custom: bool,
    /// `|case:<style>`; unknown styles are dropped at parse time
    pub case: Option<CaseStyle>,
    /// `@list` suffix on the name segment
    pub list_hint: Option<ListHint>,
}

impl ValueSpec {
    /// Parse a raw spec string (the text between `VALUE:` and `}}`).
    pub fn parse(raw: &str) -> Self {
        let mut spec = ValueSpec {
            raw: raw.to_string(),
            ..ValueSpec::default()
        };

        let mut segments = raw.split('|');
        let mut names = segments.next().unwrap_or("").to_string();

        let hint = LIST_HINT.captures(&names).map(|caps| {
            let delimiter = caps
                .get(1)
                .and_then(|m| m.as_str().chars().next())
                .unwrap_or(',');
            (caps.get(0).unwrap().start(), delimiter)
        });
        if let Some((hint_start, delimiter)) = hint {
            spec.list_hint = Some(ListHint { delimiter });
            names.truncate(hint_start);
        }

        spec.options = names
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        for segment in segments {
            let segment = segment.trim();
            if let Some(labels) = strip_modifier(segment, "text:") {
                spec.labels = Some(labels.split(',').map(|s| s.trim().to_string()).collect());
            } else if let Some(default) = strip_modifier(segment, "default:") {
                spec.default = Some(default.trim().to_string());
            } else if let Some(style) = strip_modifier(segment, "case:") {
                spec.case = CaseStyle::parse(style);
            } else if segment.eq_ignore_ascii_case("custom") {
                spec.allow_custom = true;
            }
            // anything else is an unknown modifier; ignored
        }

        spec
    }

    /// A single bare name resolves as a named variable, not a suggestion.
    pub fn is_named_variable(&self) -> bool {
        self.options.len() == 1 && self.labels.is_none()
    }

    /// The variable name, when this is a named-variable spec.
    pub fn name(&self) -> Option<&str> {
        if self.is_named_variable() {
            self.options.first().map(String::as_str)
        } else {
            None
        }
    }
}

fn strip_modifier<'a>(segment: &'a str, prefix: &str) -> Option<&'a str> {
    let head = segment.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&segment[prefix.len()..])
    } else {
        None
    }
}
