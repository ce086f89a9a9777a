//! # QuickCapture Capture
//!
//! The placement half of the capture system.
//!
//! - [`placement`] computes where substituted text lands in a note: top
//!   below frontmatter, bottom, after an anchor line (optionally at the
//!   end of the matched section), or inline within a line.
//! - [`canvas`] resolves canvas-node destinations and protects
//!   configured-context writes with an optimistic snapshot guard.
//! - [`runner`] orchestrates one capture run end to end against a
//!   [`quickcapture_vault::DocumentStore`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use quickcapture_capture::prelude::*;
//! use quickcapture_format::prelude::*;
//! use quickcapture_vault::VaultStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let store = Arc::new(VaultStore::new("/path/to/vault")?);
//! let runner = CaptureRunner::new(store, Formatter::preview());
//!
//! let settings = CaptureSettings::builder("inbox", TargetSpec::File("inbox.md".into()))
//!     .placement(PlacementMode::Bottom)
//!     .format("- {{DATE:%H:%M}} {{VALUE}}\n")
//!     .create_if_missing()
//!     .build()?;
//!
//! runner.run(&settings).await?;
//! # Ok(())
//! # }
//! ```

pub mod canvas;
pub mod placement;
pub mod runner;

pub use canvas::{
    ActiveCanvas, CanvasCapture, ResolvedCanvasTarget, check_action, resolve_active_node,
    update_active_text,
};
pub use placement::{append_bottom, insert_top, place_capture};
pub use runner::{CaptureOutcome, CaptureRunner};
pub use quickcapture_core::prelude::*;

pub mod prelude {
    pub use crate::canvas::{ActiveCanvas, CanvasCapture, ResolvedCanvasTarget};
    pub use crate::placement::place_capture;
    pub use crate::runner::{CaptureOutcome, CaptureRunner};
    pub use quickcapture_core::prelude::*;
}
