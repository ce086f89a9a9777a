//! Canvas document models.
//!
//! A canvas is a JSON node graph. The engine never invents or removes
//! nodes; it only rewrites the `text` field of an existing node or targets
//! the file a `file` node links to. Unknown JSON keys are preserved
//! through flattened maps so a round-trip does not lose host data, and
//! serialization uses tab indentation to match the host application's
//! on-disk convention.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One node of a canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Classification of a canvas node for capture purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasNodeKind {
    /// Carries inline text the capture can rewrite
    Text,
    /// References a file the capture is redirected to
    File,
    /// Anything lacking a text string or file reference
    Unsupported,
}

impl CanvasNode {
    /// Classify this node by what it carries.
    pub fn kind(&self) -> CanvasNodeKind {
        if self.text.is_some() {
            CanvasNodeKind::Text
        } else if self.file.is_some() {
            CanvasNodeKind::File
        } else {
            CanvasNodeKind::Unsupported
        }
    }
}

/// A parsed canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasData {
    pub nodes: Vec<CanvasNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanvasData {
    /// Parse a canvas file. Unparseable JSON or a missing `nodes` array
    /// is a hard error.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::parse_error(format!("invalid canvas document: {e}")))
    }

    /// Serialize with tab indentation, the canvas wire format.
    pub fn to_tab_indented_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)
            .map_err(|e| Error::parse_error(format!("failed to serialize canvas: {e}")))?;
        String::from_utf8(buf)
            .map_err(|e| Error::parse_error(format!("canvas serialization produced non-UTF8: {e}")))
    }

    /// Find a node by id. Ids are unique within one canvas file.
    pub fn node(&self, id: &str) -> Option<&CanvasNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Mutable lookup for rewriting a node's text.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut CanvasNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }
}
