use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use super::{EntryKind, StorageBackend, StorageEntry, StorageError, StorageResult, StoredFile};

/// Storage backend on a local directory. Commit messages are only logged.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

fn content_version(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let mut resolved = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(StorageError::Backend(format!("invalid path: {path}")));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    fn current_version(&self, full: &Path) -> StorageResult<Option<String>> {
        if !full.is_file() {
            return Ok(None);
        }
        Ok(Some(content_version(&fs::read(full)?)))
    }
}

impl StorageBackend for LocalStorage {
    fn read_file(&self, path: &str) -> StorageResult<Option<StoredFile>> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Ok(None);
        }
        let content = fs::read(&full)?;
        let version = content_version(&content);
        Ok(Some(StoredFile { content, version }))
    }

    fn write_file(
        &mut self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> StorageResult<()> {
        let full = self.resolve(path)?;
        match (self.current_version(&full)?, version) {
            (Some(_), None) => return Err(StorageError::AlreadyExists(path.to_string())),
            (None, Some(_)) => return Err(StorageError::NotFound(path.to_string())),
            (Some(current), Some(expected)) if current != expected => {
                return Err(StorageError::Conflict(path.to_string()));
            }
            _ => {}
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;
        tracing::debug!(path, message, "local write");
        Ok(())
    }

    fn delete_file(&mut self, path: &str, message: &str, version: &str) -> StorageResult<()> {
        let full = self.resolve(path)?;
        match self.current_version(&full)? {
            None => return Err(StorageError::NotFound(path.to_string())),
            Some(current) if current != version => {
                return Err(StorageError::Conflict(path.to_string()));
            }
            Some(_) => {}
        }
        fs::remove_file(&full)?;
        tracing::debug!(path, message, "local delete");

        // Directories exist only while they hold files, as on a git host.
        let mut dir = full.parent().map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.root || fs::read_dir(&current)?.next().is_some() {
                break;
            }
            fs::remove_dir(&current)?;
            dir = current.parent().map(Path::to_path_buf);
        }
        Ok(())
    }

    fn list_directory(&self, path: &str) -> StorageResult<Vec<StorageEntry>> {
        let full = self.resolve(path)?;
        if !full.is_dir() {
            return Ok(Vec::new());
        }
        let base = path.trim_matches('/');
        let mut entries = Vec::new();
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if entry.file_type()?.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            let path = if base.is_empty() {
                name.clone()
            } else {
                format!("{base}/{name}")
            };
            entries.push(StorageEntry { name, path, kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_read_and_update() {
        let dir = TempDir::new().unwrap();
        let mut storage = LocalStorage::new(dir.path());

        storage.write_file("refs/references.json", b"{}", "init", None).unwrap();
        let file = storage.read_file("refs/references.json").unwrap().unwrap();
        assert_eq!(file.content, b"{}");

        storage
            .write_file("refs/references.json", b"{\"a\":{}}", "update", Some(&file.version))
            .unwrap();
        let err = storage
            .write_file("refs/references.json", b"{}", "update", Some(&file.version))
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn delete_prunes_empty_directories() {
        let dir = TempDir::new().unwrap();
        let mut storage = LocalStorage::new(dir.path());
        storage.write_file("refs/data/p1/a.pdf", b"%PDF", "add", None).unwrap();
        assert!(storage.remove_file("refs/data/p1/a.pdf", "delete").unwrap());
        assert!(!dir.path().join("refs/data").exists());
        assert!(storage.list_directory("refs/data").unwrap().is_empty());
    }

    #[test]
    fn rejects_parent_segments() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.read_file("../etc/passwd").is_err());
    }

    #[test]
    fn lists_relative_paths() {
        let dir = TempDir::new().unwrap();
        let mut storage = LocalStorage::new(dir.path());
        storage.write_file("refs/raw/x.json", b"{}", "add", None).unwrap();
        let entries = storage.list_directory("refs/raw").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "refs/raw/x.json");
    }
}
