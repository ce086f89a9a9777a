//! # QuickCapture Vault
//!
//! Document storage for the capture engine.
//!
//! The engine consumes the [`DocumentStore`] trait; [`VaultStore`] is the
//! file-backed implementation with atomic write-to-temp-then-rename
//! persistence and path-traversal rejection.

pub mod store;

pub use store::{DocumentStore, VaultStore};
pub use quickcapture_core::prelude::*;

pub mod prelude {
    pub use crate::store::{DocumentStore, VaultStore};
    pub use quickcapture_core::prelude::*;
}
