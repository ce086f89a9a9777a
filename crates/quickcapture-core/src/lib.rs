//! # QuickCapture Core
//!
//! Core data models, error types, and settings for the capture system.
//! This crate defines the canonical types that all other crates depend on.
//!
//! ## Core Modules
//!
//! - [`error`] - Error taxonomy and the crate-wide `Result` alias
//! - [`context`] - Per-run variable store and resolved-value types
//! - [`settings`] - Capture configuration with builders and validation
//! - [`canvas`] - Canvas (JSON node graph) document models
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. User cancellation is a
//! distinguished variant ([`Error::Aborted`], see [`Error::is_abort`]) so
//! callers can separate "user changed their mind" from "operation failed".

pub mod canvas;
pub mod context;
pub mod error;
pub mod settings;

pub use canvas::{CanvasData, CanvasNode, CanvasNodeKind};
pub use context::{ActiveDocument, FormatContext, ListHint, VariableValue, split_list_input};
pub use error::{Error, Result};
pub use settings::{
    ActiveFilePosition, BlankLinePolicy, CaptureAction, CaptureSettings, CaptureTarget,
    InlinePolicy, InsertAfterPolicy, PlacementMode, PlacementPolicy, TargetSpec,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::canvas::{CanvasData, CanvasNode, CanvasNodeKind};
    pub use crate::context::{
        ActiveDocument, FormatContext, ListHint, VariableValue, split_list_input,
    };
    pub use crate::error::{Error, Result};
    pub use crate::settings::{
        ActiveFilePosition, BlankLinePolicy, CaptureAction, CaptureSettings, CaptureTarget,
        InlinePolicy, InsertAfterPolicy, PlacementMode, PlacementPolicy, TargetSpec,
    };
}
