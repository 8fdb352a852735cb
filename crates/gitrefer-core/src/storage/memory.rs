use std::collections::{BTreeMap, BTreeSet};

use super::{EntryKind, StorageBackend, StorageEntry, StorageError, StorageResult, StoredFile};

/// In-process storage backend. Versions are a global write counter.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    files: BTreeMap<String, (Vec<u8>, u64)>,
    next_version: u64,
    failing: Vec<String>,
    messages: Vec<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write or delete whose path contains `needle` fail.
    pub fn fail_on(&mut self, needle: impl Into<String>) {
        self.failing.push(needle.into());
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    /// Paths of all stored files, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Commit messages of every successful mutation, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    fn check_failure(&self, path: &str) -> StorageResult<()> {
        if self.failing.iter().any(|needle| path.contains(needle.as_str())) {
            return Err(StorageError::Backend(format!("injected failure for {path}")));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryStorage {
    fn read_file(&self, path: &str) -> StorageResult<Option<StoredFile>> {
        Ok(self.files.get(path).map(|(content, version)| StoredFile {
            content: content.clone(),
            version: version.to_string(),
        }))
    }

    fn write_file(
        &mut self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> StorageResult<()> {
        self.check_failure(path)?;
        let current = self.files.get(path).map(|(_, v)| v.to_string());
        match (current, version) {
            (Some(_), None) => return Err(StorageError::AlreadyExists(path.to_string())),
            (None, Some(_)) => return Err(StorageError::NotFound(path.to_string())),
            (Some(current), Some(expected)) if current != expected => {
                return Err(StorageError::Conflict(path.to_string()));
            }
            _ => {}
        }
        self.next_version += 1;
        self.files
            .insert(path.to_string(), (content.to_vec(), self.next_version));
        self.messages.push(message.to_string());
        Ok(())
    }

    fn delete_file(&mut self, path: &str, message: &str, version: &str) -> StorageResult<()> {
        self.check_failure(path)?;
        match self.files.get(path) {
            None => Err(StorageError::NotFound(path.to_string())),
            Some((_, current)) if current.to_string() != version => {
                Err(StorageError::Conflict(path.to_string()))
            }
            Some(_) => {
                self.files.remove(path);
                self.messages.push(message.to_string());
                Ok(())
            }
        }
    }

    fn list_directory(&self, path: &str) -> StorageResult<Vec<StorageEntry>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut files = Vec::new();
        let mut dirs = BTreeSet::new();
        for key in self.files.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    dirs.insert(dir.to_string());
                }
                None => files.push(rest.to_string()),
            }
        }

        let mut entries: Vec<StorageEntry> = dirs
            .into_iter()
            .map(|name| StorageEntry {
                path: format!("{prefix}{name}"),
                name,
                kind: EntryKind::Dir,
            })
            .chain(files.into_iter().map(|name| StorageEntry {
                path: format!("{prefix}{name}"),
                name,
                kind: EntryKind::File,
            }))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
