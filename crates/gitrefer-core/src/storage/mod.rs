//! Storage collaborator: a versioned file tree addressed by `/`-separated paths.
//!
//! Every write to an existing file must present the version token returned by
//! the last read, the way the GitHub contents API requires the blob `sha`.
//! Backends: [`memory::MemoryStorage`] and [`local::LocalStorage`] here, the
//! GitHub contents API in `gitrefer-remote`.

pub mod layout;
pub mod local;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use layout::{StoreLayout, sanitize_id};
pub use local::LocalStorage;
pub use memory::MemoryStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("stale version for {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// File content together with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

pub trait StorageBackend {
    /// Read a file; `Ok(None)` when it does not exist.
    fn read_file(&self, path: &str) -> StorageResult<Option<StoredFile>>;

    /// Create (`version == None`) or update (`version == Some(current)`) a file.
    fn write_file(
        &mut self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> StorageResult<()>;

    fn delete_file(&mut self, path: &str, message: &str, version: &str) -> StorageResult<()>;

    /// List a directory; a missing directory lists as empty.
    fn list_directory(&self, path: &str) -> StorageResult<Vec<StorageEntry>>;

    /// Read + create + delete. Not atomic: a failure after the create leaves
    /// the file in both places.
    fn move_file(&mut self, old_path: &str, new_path: &str) -> StorageResult<()> {
        let file = self
            .read_file(old_path)?
            .ok_or_else(|| StorageError::NotFound(old_path.to_string()))?;
        let message = format!("Move file: {old_path} -> {new_path}");
        self.write_file(new_path, &file.content, &message, None)?;
        self.delete_file(old_path, &message, &file.version)
    }

    /// Create the file, or update it against its current version.
    fn put_file(&mut self, path: &str, content: &[u8], message: &str) -> StorageResult<()> {
        let version = self.read_file(path)?.map(|file| file.version);
        self.write_file(path, content, message, version.as_deref())
    }

    /// Delete the file if present. Returns whether anything was deleted.
    fn remove_file(&mut self, path: &str, message: &str) -> StorageResult<bool> {
        match self.read_file(path)? {
            Some(file) => {
                self.delete_file(path, message, &file.version)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Every file below `dir`, depth first in listing order.
    fn walk(&self, dir: &str) -> StorageResult<Vec<StorageEntry>> {
        let mut pending = self.list_directory(dir)?;
        pending.reverse();
        let mut files = Vec::new();
        while let Some(entry) = pending.pop() {
            match entry.kind {
                EntryKind::File => files.push(entry),
                EntryKind::Dir => {
                    let mut children = self.list_directory(&entry.path)?;
                    children.reverse();
                    pending.extend(children);
                }
            }
        }
        Ok(files)
    }
}

impl<T: StorageBackend + ?Sized> StorageBackend for Box<T> {
    fn read_file(&self, path: &str) -> StorageResult<Option<StoredFile>> {
        (**self).read_file(path)
    }

    fn write_file(
        &mut self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> StorageResult<()> {
        (**self).write_file(path, content, message, version)
    }

    fn delete_file(&mut self, path: &str, message: &str, version: &str) -> StorageResult<()> {
        (**self).delete_file(path, message, version)
    }

    fn list_directory(&self, path: &str) -> StorageResult<Vec<StorageEntry>> {
        (**self).list_directory(path)
    }

    fn move_file(&mut self, old_path: &str, new_path: &str) -> StorageResult<()> {
        (**self).move_file(old_path, new_path)
    }
}

/// Last path segment.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
