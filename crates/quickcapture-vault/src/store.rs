//! Document storage.
//!
//! The capture engine only ever talks to a [`DocumentStore`]; hosts embed
//! their own storage behind the trait. [`VaultStore`] is the file-backed
//! implementation: a root directory, relative paths, atomic writes.

use async_trait::async_trait;
use quickcapture_core::prelude::*;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Storage collaborator consumed by the capture engine.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document's full content.
    async fn read(&self, path: &Path) -> Result<String>;

    /// Write a document, replacing existing content. Creates parent
    /// directories as needed.
    async fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Whether a document exists.
    async fn exists(&self, path: &Path) -> bool;

    /// List document paths under a folder (relative to the store root).
    async fn list(&self, folder: &Path) -> Result<Vec<PathBuf>>;
}

/// File-backed store rooted at a vault directory.
pub struct VaultStore {
    root: PathBuf,
}

impl VaultStore {
    /// Create a store over an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::invalid_path(format!(
                "vault root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path against the root, rejecting escapes.
    fn resolve_path(&self, path: &Path) -> Result<PathBuf> {
        if path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::path_traversal(path));
        }

        let full = self.root.join(path);
        if !full.starts_with(&self.root) {
            return Err(Error::path_traversal(full));
        }
        Ok(full)
    }
}

#[async_trait]
impl DocumentStore for VaultStore {
    #[instrument(skip(self), fields(file = ?path), name = "vault_read")]
    async fn read(&self, path: &Path) -> Result<String> {
        let full = self.resolve_path(path)?;
        if !full.is_file() {
            return Err(Error::file_not_found(path));
        }
        tokio::fs::read_to_string(&full).await.map_err(Error::io)
    }

    #[instrument(skip(self, content), fields(file = ?path, size = content.len()), name = "vault_write")]
    async fn write(&self, path: &Path, content: &str) -> Result<()> {
        let full = self.resolve_path(path)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::io)?;
        }

        // Write to temp file first, then atomic rename
        let temp_path = full.with_extension("tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(Error::io)?;
        tokio::fs::rename(&temp_path, &full)
            .await
            .map_err(Error::io)?;

        log::debug!("wrote {} bytes to {}", content.len(), full.display());
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).map(|p| p.is_file()).unwrap_or(false)
    }

    async fn list(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        let full = self.resolve_path(folder)?;
        if !full.is_dir() {
            return Err(Error::file_not_found(folder));
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&full)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(relative.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, VaultStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = VaultStore::new(dir.path()).expect("store");
        (dir, store)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (_dir, store) = setup().await;
        let path = Path::new("notes/inbox.md");

        store.write(path, "# Inbox\n").await.unwrap();
        assert!(store.exists(path).await);
        assert_eq!(store.read(path).await.unwrap(), "# Inbox\n");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, store) = setup().await;
        let result = store.read(Path::new("gone.md")).await;
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (_dir, store) = setup().await;
        let result = store.read(Path::new("../outside.md")).await;
        assert!(matches!(result, Err(Error::PathTraversalAttempt { .. })));
    }

    #[tokio::test]
    async fn test_list_returns_relative_paths() {
        let (_dir, store) = setup().await;
        store.write(Path::new("a.md"), "a").await.unwrap();
        store.write(Path::new("sub/b.md"), "b").await.unwrap();

        let files = store.list(Path::new("")).await.unwrap();
        assert_eq!(files, vec![PathBuf::from("a.md"), PathBuf::from("sub/b.md")]);
    }

    #[tokio::test]
    async fn test_invalid_root_rejected() {
        assert!(VaultStore::new("/definitely/not/a/real/dir").is_err());
    }
}
