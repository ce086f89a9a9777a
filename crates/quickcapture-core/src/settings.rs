//! Capture configuration types.
//!
//! Follows a builder pattern for complex configuration with validation.
//! Validation happens up front so a run never fails halfway through on a
//! contradiction that was visible in the settings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Blank-line handling when inserting after a matched anchor line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlankLinePolicy {
    /// Skip blank lines only when the anchor matched a heading line
    #[default]
    Auto,
    /// Always skip the blank run following the match
    Skip,
    /// Insert immediately after the matched line
    None,
}

/// Settings for insert-after placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertAfterPolicy {
    /// Anchor line, matched exact-or-prefix with leading whitespace ignored.
    /// May contain tokens; resolved before placement runs.
    pub anchor: String,
    /// Insert at the end of the matched section instead of right after
    /// the anchor line.
    pub at_end_of_section: bool,
    pub blank_lines: BlankLinePolicy,
    /// Create the anchor line at the bottom when it is missing, instead
    /// of skipping the write.
    pub create_if_missing: bool,
}

impl InsertAfterPolicy {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
            at_end_of_section: false,
            blank_lines: BlankLinePolicy::default(),
            create_if_missing: false,
        }
    }

    pub fn at_end_of_section(mut self) -> Self {
        self.at_end_of_section = true;
        self
    }

    pub fn blank_lines(mut self, policy: BlankLinePolicy) -> Self {
        self.blank_lines = policy;
        self
    }

    pub fn create_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }
}

/// Settings for inline (same-line) placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlinePolicy {
    /// Substring locating the insertion point. Must be single-line.
    pub anchor: String,
    /// Replace from the anchor match to end-of-line instead of inserting.
    pub replace_to_end_of_line: bool,
}

/// Where the substituted text lands in the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlacementMode {
    /// Top of the note, below any frontmatter block
    Top,
    /// Bottom of the note
    Bottom,
    /// After the first line matching an anchor
    InsertAfter(InsertAfterPolicy),
    /// Within the first line containing an anchor substring
    Inline(InlinePolicy),
}

impl Default for PlacementMode {
    fn default() -> Self {
        PlacementMode::Top
    }
}

/// Write-position override when the destination is the active document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveFilePosition {
    Top,
    Bottom,
    Cursor,
}

/// Placement mode plus the active-file override that can trump it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementPolicy {
    pub mode: PlacementMode,
    /// Overrides Top/Bottom placement when capturing to the active file.
    pub active_position: Option<ActiveFilePosition>,
}

impl PlacementPolicy {
    pub fn new(mode: PlacementMode) -> Self {
        Self {
            mode,
            active_position: None,
        }
    }

    /// The action class used for canvas compatibility checks.
    pub fn action(&self) -> CaptureAction {
        if self.active_position == Some(ActiveFilePosition::Cursor) {
            return CaptureAction::Cursor;
        }
        match &self.mode {
            PlacementMode::Top => CaptureAction::Top,
            PlacementMode::Bottom => CaptureAction::Bottom,
            PlacementMode::InsertAfter(_) => CaptureAction::InsertAfter,
            PlacementMode::Inline(_) => CaptureAction::Inline,
        }
    }
}

/// Coarse classification of a placement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureAction {
    Top,
    Bottom,
    InsertAfter,
    Inline,
    Cursor,
}

/// Where a capture is configured to go, before per-run resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetSpec {
    /// A path in the store. May contain tokens and may name a folder
    /// (trailing `/`), in which case a file name is prompted for.
    File(String),
    /// The currently active note
    ActiveFile,
    /// A node inside a canvas file
    CanvasNode { path: String, node_id: String },
    /// The single selected node in the active canvas view
    ActiveCanvasNode,
}

/// A resolved capture destination. Produced immediately before the write
/// and never cached across runs.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureTarget {
    /// A linear-text note
    Note { path: PathBuf },
    /// A text card in a canvas file
    CanvasText { path: PathBuf, node_id: String },
    /// A file card in a canvas file; the capture goes to the linked note
    CanvasFile { path: PathBuf, file: PathBuf },
}

/// Full configuration for one capture choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Display name of the choice
    pub name: String,
    pub target: TargetSpec,
    pub placement: PlacementPolicy,
    /// Format string expanded for every capture
    pub format: String,
    /// Create the destination note when it does not exist
    pub create_if_missing: bool,
}

impl CaptureSettings {
    /// Create a builder for capture settings
    pub fn builder(name: impl Into<String>, target: TargetSpec) -> CaptureSettingsBuilder {
        CaptureSettingsBuilder {
            name: name.into(),
            target,
            placement: PlacementPolicy::default(),
            format: "{{VALUE}}\n".to_string(),
            create_if_missing: false,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config_error("capture name cannot be empty"));
        }

        if let PlacementMode::Inline(inline) = &self.placement.mode {
            if inline.anchor.contains('\n') {
                return Err(Error::config_error(
                    "inline anchor must not contain a newline",
                ));
            }
            if inline.anchor.is_empty() {
                return Err(Error::config_error("inline anchor cannot be empty"));
            }
        }

        if let PlacementMode::InsertAfter(after) = &self.placement.mode
            && after.anchor.trim().is_empty()
        {
            return Err(Error::config_error("insert-after anchor cannot be empty"));
        }

        Ok(())
    }
}

/// Builder for CaptureSettings
pub struct CaptureSettingsBuilder {
    name: String,
    target: TargetSpec,
    placement: PlacementPolicy,
    format: String,
    create_if_missing: bool,
}

impl CaptureSettingsBuilder {
    pub fn placement(mut self, mode: PlacementMode) -> Self {
        self.placement.mode = mode;
        self
    }

    pub fn active_position(mut self, position: ActiveFilePosition) -> Self {
        self.placement.active_position = Some(position);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn create_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    pub fn build(self) -> Result<CaptureSettings> {
        let settings = CaptureSettings {
            name: self.name,
            target: self.target,
            placement: self.placement,
            format: self.format,
            create_if_missing: self.create_if_missing,
        };
        settings.validate()?;
        Ok(settings)
    }
}
