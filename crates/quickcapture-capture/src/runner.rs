//! The capture runner: one choice-execution run, end to end.
//!
//! A run gets a fresh [`FormatContext`], resolves the (possibly
//! token-bearing) target into a concrete destination, expands the format
//! string, places the result, and writes. Target resolution happens
//! immediately before the write and is never cached across runs, so a run
//! always acts on the live document tree.
//!
//! Error policy: aborts propagate unchanged and are not logged as
//! failures; a missing insert-after anchor degrades to a skipped write;
//! configuration and concurrency errors stop the run.

use crate::canvas::{ActiveCanvas, CanvasCapture, resolve_active_node, update_active_text};
use crate::placement::place_capture;
use quickcapture_core::prelude::*;
use quickcapture_format::engine::Formatter;
use quickcapture_vault::DocumentStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// What one capture run did.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Content written to a note or canvas file
    Written { path: PathBuf },
    /// Insert-after anchor missing and creation not configured
    SkippedMissingAnchor { path: PathBuf, anchor: String },
    /// A live canvas card was rewritten; the host persists the view
    UpdatedActiveCanvas { node_id: String },
}

/// Runs capture choices against a document store.
pub struct CaptureRunner {
    store: Arc<dyn DocumentStore>,
    formatter: Formatter,
}

impl CaptureRunner {
    pub fn new(store: Arc<dyn DocumentStore>, formatter: Formatter) -> Self {
        Self { store, formatter }
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Execute one capture choice.
    #[instrument(skip(self, settings), fields(choice = %settings.name), name = "capture_run")]
    pub async fn run(&self, settings: &CaptureSettings) -> Result<CaptureOutcome> {
        settings.validate()?;
        let mut ctx = FormatContext::new();

        let result = self.execute(settings, &mut ctx).await;
        match &result {
            Ok(outcome) => log::info!("capture '{}' finished: {outcome:?}", settings.name),
            Err(e) if e.is_abort() => log::debug!("capture '{}' cancelled", settings.name),
            Err(e) => log::error!("capture '{}' failed: {e}", settings.name),
        }
        result
    }

    /// Execute a capture whose target is the selected node of the active
    /// canvas view. The mutated view is handed back to the host to
    /// persist; no snapshot guard applies.
    pub async fn run_on_active_canvas(
        &self,
        settings: &CaptureSettings,
        canvas: &mut ActiveCanvas,
    ) -> Result<CaptureOutcome> {
        settings.validate()?;
        let mut ctx = FormatContext::new();
        let action = settings.placement.action();

        let (node_id, kind, existing, file) = {
            let node = resolve_active_node(canvas, action)?;
            (
                node.id.clone(),
                node.kind(),
                node.text.clone().unwrap_or_default(),
                node.file.as_deref().map(PathBuf::from),
            )
        };

        match kind {
            CanvasNodeKind::Text => {
                if let Some(stem) = canvas.path.file_stem() {
                    ctx.set_title(stem.to_string_lossy());
                }
                let formatted = self.formatter.format(&settings.format, &mut ctx).await?;
                let policy = self
                    .resolve_policy(&settings.placement, &mut ctx, false)
                    .await?;
                let placed = place_capture(&existing, &formatted, &policy, None)?;
                update_active_text(canvas, &node_id, placed)?;
                Ok(CaptureOutcome::UpdatedActiveCanvas { node_id })
            }
            CanvasNodeKind::File => {
                let file = file.ok_or_else(|| Error::not_found("file reference on canvas card"))?;
                self.capture_to_note(&file, settings, &mut ctx, false).await
            }
            CanvasNodeKind::Unsupported => Err(Error::config_error(
                "canvas node is neither a text card nor a file card",
            )),
        }
    }

    async fn execute(
        &self,
        settings: &CaptureSettings,
        ctx: &mut FormatContext,
    ) -> Result<CaptureOutcome> {
        match &settings.target {
            TargetSpec::File(raw) => {
                let path = self.resolve_note_path(raw, ctx).await?;
                self.capture_to_note(&path, settings, ctx, false).await
            }
            TargetSpec::ActiveFile => {
                let active = self
                    .formatter
                    .options()
                    .active
                    .as_ref()
                    .ok_or_else(|| Error::config_error("no active file to capture to"))?;
                if active.path.extension().and_then(|e| e.to_str()) == Some("canvas") {
                    return Err(Error::config_error(
                        "the active file is a canvas; capture to a canvas node instead",
                    ));
                }
                let path = active.path.clone();
                self.capture_to_note(&path, settings, ctx, true).await
            }
            TargetSpec::CanvasNode { path, node_id } => {
                let rendered = self.formatter.format(path, ctx).await?;
                let path = PathBuf::from(rendered.trim());
                self.capture_to_canvas_node(&path, node_id, settings, ctx)
                    .await
            }
            TargetSpec::ActiveCanvasNode => Err(Error::config_error(
                "active-canvas capture needs the live view; use run_on_active_canvas",
            )),
        }
    }

    /// Resolve a raw target string into a markdown note path: expand
    /// tokens, prompt for a name when the target is a folder, sanitize,
    /// and enforce the extension rules.
    async fn resolve_note_path(&self, raw: &str, ctx: &mut FormatContext) -> Result<PathBuf> {
        let rendered = self.formatter.format(raw, ctx).await?;
        let mut target = rendered.trim().to_string();

        if target.is_empty() || target.ends_with('/') {
            let name = self
                .formatter
                .resolvers()
                .prompter
                .prompt_text("File name", None)
                .await?;
            if name.trim().is_empty() {
                return Err(Error::invalid_path("empty capture file name"));
            }
            target.push_str(name.trim());
        }

        let sanitized = sanitize_path(&target);
        match Path::new(&sanitized).extension().and_then(|e| e.to_str()) {
            None => Ok(PathBuf::from(format!("{sanitized}.md"))),
            Some("md") => Ok(PathBuf::from(sanitized)),
            Some("canvas") => Err(Error::config_error(
                "canvas files need a node target, not a note target",
            )),
            Some(other) => Err(Error::config_error(format!(
                "unsupported capture target extension: .{other}"
            ))),
        }
    }

    async fn capture_to_note(
        &self,
        path: &Path,
        settings: &CaptureSettings,
        ctx: &mut FormatContext,
        is_active: bool,
    ) -> Result<CaptureOutcome> {
        let existing = if self.store.exists(path).await {
            self.store.read(path).await?
        } else if settings.create_if_missing {
            String::new()
        } else {
            return Err(Error::file_not_found(path));
        };

        if let Some(stem) = path.file_stem() {
            ctx.set_title(stem.to_string_lossy());
        }

        let formatted = self.formatter.format(&settings.format, ctx).await?;
        let policy = self
            .resolve_policy(&settings.placement, ctx, is_active)
            .await?;
        let cursor = if is_active {
            self.formatter
                .options()
                .active
                .as_ref()
                .and_then(|a| a.cursor_offset)
        } else {
            None
        };

        match place_capture(&existing, &formatted, &policy, cursor) {
            Ok(content) => {
                self.store.write(path, &content).await?;
                Ok(CaptureOutcome::Written {
                    path: path.to_path_buf(),
                })
            }
            Err(Error::AnchorNotFound { anchor }) => {
                if let PlacementMode::InsertAfter(after) = &policy.mode
                    && after.create_if_missing
                {
                    // create the anchor at the bottom, then the capture under it
                    let block = format!("{anchor}\n{formatted}");
                    let content = crate::placement::append_bottom(&existing, &block);
                    self.store.write(path, &content).await?;
                    return Ok(CaptureOutcome::Written {
                        path: path.to_path_buf(),
                    });
                }
                log::warn!(
                    "anchor '{anchor}' not found in {}; capture skipped",
                    path.display()
                );
                Ok(CaptureOutcome::SkippedMissingAnchor {
                    path: path.to_path_buf(),
                    anchor,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn capture_to_canvas_node(
        &self,
        path: &Path,
        node_id: &str,
        settings: &CaptureSettings,
        ctx: &mut FormatContext,
    ) -> Result<CaptureOutcome> {
        let canvas = CanvasCapture::new(self.store.as_ref());
        let action = settings.placement.action();
        let target = canvas.resolve(path, node_id, action).await?;

        if let Some(file) = target.file() {
            let file = file.to_path_buf();
            return self.capture_to_note(&file, settings, ctx, false).await;
        }

        if let Some(stem) = path.file_stem() {
            ctx.set_title(stem.to_string_lossy());
        }

        let existing = target.node_text();
        let formatted = self.formatter.format(&settings.format, ctx).await?;
        let policy = self
            .resolve_policy(&settings.placement, ctx, false)
            .await?;

        match place_capture(&existing, &formatted, &policy, None) {
            Ok(content) => {
                canvas.write_node_text(&target, &content).await?;
                Ok(CaptureOutcome::Written {
                    path: path.to_path_buf(),
                })
            }
            Err(Error::AnchorNotFound { anchor }) => {
                log::warn!(
                    "anchor '{anchor}' not found in canvas node {node_id}; capture skipped"
                );
                Ok(CaptureOutcome::SkippedMissingAnchor {
                    path: path.to_path_buf(),
                    anchor,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Expand tokens in placement anchors and drop the active-file
    /// override when the destination is not the active document.
    async fn resolve_policy(
        &self,
        policy: &PlacementPolicy,
        ctx: &mut FormatContext,
        is_active: bool,
    ) -> Result<PlacementPolicy> {
        let mut resolved = policy.clone();
        if !is_active {
            resolved.active_position = None;
        }

        match &mut resolved.mode {
            PlacementMode::InsertAfter(after) => {
                let anchor = self.formatter.format(&after.anchor, ctx).await?;
                after.anchor = anchor;
            }
            PlacementMode::Inline(inline) => {
                let anchor = self.formatter.format(&inline.anchor, ctx).await?;
                if anchor.contains('\n') {
                    return Err(Error::config_error(
                        "inline anchor must not contain a newline",
                    ));
                }
                inline.anchor = anchor;
            }
            _ => {}
        }
        Ok(resolved)
    }
}

/// Strip characters the host file systems reject, keeping `/` as the
/// folder separator.
fn sanitize_path(raw: &str) -> String {
    raw.split('/')
        .map(|component| {
            component
                .chars()
                .filter(|c| !matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
