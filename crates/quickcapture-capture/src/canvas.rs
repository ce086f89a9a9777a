//! Canvas target resolution and optimistic writes.
//!
//! Canvas files are JSON and the storage layer has no transactional write
//! primitive, so configured-context writes use an optimistic guard: the
//! resolver retains the exact raw content it read, re-reads immediately
//! before writing, and aborts on any byte difference instead of clobbering
//! a concurrent edit. Active-context captures mutate the live in-memory
//! canvas instead and leave persistence to the host, so they carry no
//! guard.

use quickcapture_core::prelude::*;
use quickcapture_vault::DocumentStore;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Check a placement action against a node kind. Only top, bottom and
/// insert-after placements make sense inside a card.
pub fn check_action(kind: CanvasNodeKind, action: CaptureAction) -> Result<()> {
    match kind {
        CanvasNodeKind::Unsupported => Err(Error::config_error(
            "canvas node is neither a text card nor a file card",
        )),
        CanvasNodeKind::Text | CanvasNodeKind::File => match action {
            CaptureAction::Top | CaptureAction::Bottom | CaptureAction::InsertAfter => Ok(()),
            CaptureAction::Cursor => Err(Error::config_error(
                "cursor placement is not supported on canvas cards",
            )),
            CaptureAction::Inline => Err(Error::config_error(
                "inline placement is not supported on canvas cards",
            )),
        },
    }
}

fn check_markdown_reference(node: &CanvasNode) -> Result<()> {
    let file = node.file.as_deref().unwrap_or_default();
    if Path::new(file).extension().and_then(|e| e.to_str()) != Some("md") {
        return Err(Error::config_error(format!(
            "canvas file card must reference a markdown file, got '{file}'"
        )));
    }
    Ok(())
}

/// A configured-context canvas target. Holds the raw snapshot taken at
/// resolution time; valid for exactly one write.
pub struct ResolvedCanvasTarget {
    path: PathBuf,
    node_id: String,
    kind: CanvasNodeKind,
    file: Option<PathBuf>,
    snapshot: String,
    data: CanvasData,
}

impl ResolvedCanvasTarget {
    pub fn kind(&self) -> CanvasNodeKind {
        self.kind
    }

    /// The linked note of a file card.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Current text of the targeted card.
    pub fn node_text(&self) -> String {
        self.data
            .node(&self.node_id)
            .and_then(|n| n.text.clone())
            .unwrap_or_default()
    }
}

/// Configured-context canvas capture against a [`DocumentStore`].
pub struct CanvasCapture<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CanvasCapture<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Resolve a canvas path + node id into a write target, validating
    /// node kind and action compatibility.
    #[instrument(skip(self), name = "canvas_resolve")]
    pub async fn resolve(
        &self,
        path: &Path,
        node_id: &str,
        action: CaptureAction,
    ) -> Result<ResolvedCanvasTarget> {
        let snapshot = self.store.read(path).await?;
        let data = CanvasData::from_json(&snapshot)?;

        let node = data.node(node_id).ok_or_else(|| {
            Error::config_error(format!(
                "canvas node '{node_id}' not found in {}",
                path.display()
            ))
        })?;

        let kind = node.kind();
        check_action(kind, action)?;

        let file = match kind {
            CanvasNodeKind::File => {
                check_markdown_reference(node)?;
                node.file.as_deref().map(PathBuf::from)
            }
            _ => None,
        };

        Ok(ResolvedCanvasTarget {
            path: path.to_path_buf(),
            node_id: node_id.to_string(),
            kind,
            file,
            snapshot,
            data,
        })
    }

    /// Rewrite the text of the targeted card, guarded against concurrent
    /// edits by a byte-for-byte snapshot comparison.
    #[instrument(skip(self, target, new_text), name = "canvas_write")]
    pub async fn write_node_text(
        &self,
        target: &ResolvedCanvasTarget,
        new_text: &str,
    ) -> Result<()> {
        if target.kind != CanvasNodeKind::Text {
            return Err(Error::config_error(
                "only text cards carry inline text to rewrite",
            ));
        }

        let current = self.store.read(&target.path).await?;
        if current != target.snapshot {
            return Err(Error::concurrency_error(
                "canvas target changed while capture was running; re-run the capture",
            ));
        }

        let mut data = target.data.clone();
        let node = data
            .node_mut(&target.node_id)
            .ok_or_else(|| Error::not_found(format!("canvas node {}", target.node_id)))?;
        node.text = Some(new_text.to_string());

        let serialized = data.to_tab_indented_json()?;
        self.store.write(&target.path, &serialized).await
    }
}

/// The focused canvas view: live document plus the user's node selection.
#[derive(Debug, Clone)]
pub struct ActiveCanvas {
    pub path: PathBuf,
    pub data: CanvasData,
    pub selected: Vec<String>,
}

/// Resolve the selected node of the active canvas view. Exactly one node
/// must be selected.
pub fn resolve_active_node(canvas: &ActiveCanvas, action: CaptureAction) -> Result<&CanvasNode> {
    if canvas.selected.len() != 1 {
        return Err(Error::config_error(format!(
            "canvas capture requires exactly one selected node, found {}",
            canvas.selected.len()
        )));
    }

    let id = &canvas.selected[0];
    let node = canvas
        .data
        .node(id)
        .ok_or_else(|| Error::not_found(format!("canvas node {id}")))?;

    check_action(node.kind(), action)?;
    if node.kind() == CanvasNodeKind::File {
        check_markdown_reference(node)?;
    }
    Ok(node)
}

/// Rewrite a text card in the live canvas object. The host persists the
/// mutated view; no snapshot guard applies here.
pub fn update_active_text(canvas: &mut ActiveCanvas, node_id: &str, new_text: String) -> Result<()> {
    let node = canvas
        .data
        .node_mut(node_id)
        .ok_or_else(|| Error::not_found(format!("canvas node {node_id}")))?;
    node.text = Some(new_text);
    Ok(())
}
