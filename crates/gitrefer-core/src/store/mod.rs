//! The reference store: the full record collection kept in memory and
//! persisted through a [`StorageBackend`] after every successful mutation.
//!
//! Rejected operations (unknown id, duplicate, malformed input, attempts to
//! change a DOI) return before any backend call. Multi-step operations are not
//! transactional; a failure partway through is reported as
//! [`GitreferError::Partial`] naming the step.

pub mod discover;

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::citekey::DEFAULT_TITLE_WORDS;
use crate::error::{GitreferError, Result};
use crate::formats::ExportStyle;
use crate::identifiers::validate_doi;
use crate::models::{ManualFields, Record, missing_key};
use crate::registry::RegistryResponse;
use crate::storage::{EntryKind, StorageBackend, StorageEntry, StoreLayout, file_name, sanitize_id};

pub use discover::{EXCLUDED_REFERENCE_KEYS, NewReference};

/// Explicit store settings; nothing is read from the environment here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory below the backend root holding the whole store.
    pub root: String,
    /// Number of title words in generated citekeys.
    pub title_words: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "references".to_string(),
            title_words: DEFAULT_TITLE_WORDS,
        }
    }
}

/// A file to upload into a record's attachment namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content: Vec<u8>,
}

/// Outcome of a tag operation. Repeating an add or remove is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagChange {
    Added,
    AlreadyPresent,
    Removed,
    NotPresent,
}

impl TagChange {
    pub fn changed(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

impl fmt::Display for TagChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::AlreadyPresent => "already exists",
            Self::Removed => "removed",
            Self::NotPresent => "not found",
        })
    }
}

pub struct ReferenceStore<S: StorageBackend> {
    backend: S,
    layout: StoreLayout,
    title_words: usize,
    references: IndexMap<String, Record>,
}

impl<S: StorageBackend> ReferenceStore<S> {
    /// Load `references.json`, creating an empty one when it does not exist.
    pub fn open(mut backend: S, config: StoreConfig) -> Result<Self> {
        let layout = StoreLayout::new(&config.root);
        let path = layout.references_file();
        let references = match backend.read_file(&path)? {
            Some(file) if !file.content.iter().all(u8::is_ascii_whitespace) => {
                parse_references(&file.content)?
            }
            Some(_) => IndexMap::new(),
            None => {
                backend.write_file(&path, b"{}", "Initialize references file", None)?;
                tracing::info!(path = %path, "initialized references file");
                IndexMap::new()
            }
        };
        tracing::debug!(count = references.len(), root = layout.root(), "opened reference store");
        Ok(Self {
            backend,
            layout,
            title_words: config.title_words,
            references,
        })
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn into_backend(self) -> S {
        self.backend
    }

    pub fn references(&self) -> &IndexMap<String, Record> {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.references.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<&Record> {
        self.references
            .get(id)
            .ok_or_else(|| GitreferError::ReferenceNotFound(id.to_string()))
    }

    /// Reject `id` when its storage slot already belongs to another record.
    /// `owner` is the record being renamed, which may keep its own slot.
    fn ensure_free_slot(&self, id: &str, owner: Option<&str>) -> Result<()> {
        let slot = sanitize_id(id);
        let taken = self
            .references
            .keys()
            .filter(|existing| Some(existing.as_str()) != owner && existing.as_str() != id)
            .find(|existing| sanitize_id(existing) == slot);
        match taken {
            Some(existing) => Err(GitreferError::StorageCollision {
                id: id.to_string(),
                existing: existing.clone(),
            }),
            None => Ok(()),
        }
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Record> {
        self.references
            .get_mut(id)
            .ok_or_else(|| GitreferError::ReferenceNotFound(id.to_string()))
    }

    /// The verbatim registry response stored for a DOI record; `None` for
    /// records without one.
    pub fn raw_data(&self, id: &str) -> Result<Option<serde_json::Value>> {
        self.get(id)?;
        match self.backend.read_file(&self.layout.raw_file(id))? {
            Some(file) => Ok(Some(serde_json::from_slice(&file.content)?)),
            None => Ok(None),
        }
    }

    /// Add a DOI record from a registry response. The response is kept as the
    /// raw shadow copy; attachments that fail to upload are left out of `files`.
    pub fn create_from_registry(
        &mut self,
        doi: &str,
        response: &RegistryResponse,
        attachments: Vec<Attachment>,
    ) -> Result<&Record> {
        if !validate_doi(doi) {
            return Err(GitreferError::InvalidDoi(doi.to_string()));
        }
        if self.contains(doi) {
            return Err(GitreferError::DuplicateReference(doi.to_string()));
        }
        self.ensure_free_slot(doi, None)?;
        let mut record = response.to_record(doi, Vec::new(), self.title_words)?;

        let raw = serde_json::to_string_pretty(&response.raw)?;
        self.backend
            .write_file(
                &self.layout.raw_file(doi),
                raw.as_bytes(),
                &format!("Add raw data for {doi}"),
                None,
            )
            .inspect_err(|e| tracing::error!(id = %doi, "failed to store raw data: {e}"))?;

        for attachment in attachments {
            let path = self.layout.data_file(doi, &attachment.name);
            let message = format!("Add data file: {} for {doi}", attachment.name);
            match self.backend.write_file(&path, &attachment.content, &message, None) {
                Ok(()) => record.files.push(attachment.name),
                Err(e) => tracing::warn!(id = %doi, file = %attachment.name, "attachment not stored: {e}"),
            }
        }

        self.references.insert(doi.to_string(), record);
        self.save()?;
        tracing::info!(id = %doi, agency = %response.agency, "added reference");
        self.get(doi)
    }

    /// Add a non-DOI record. Ids shaped like a DOI are reserved for registry
    /// records.
    pub fn create_manual(&mut self, id: &str, fields: ManualFields) -> Result<&Record> {
        if id.trim().is_empty() {
            return Err(GitreferError::ValidationError("reference id is empty".to_string()));
        }
        if self.contains(id) {
            return Err(GitreferError::DuplicateReference(id.to_string()));
        }
        if validate_doi(id) {
            return Err(GitreferError::DoiShapedId(id.to_string()));
        }
        self.ensure_free_slot(id, None)?;
        let record = Record::manual(id, fields, self.title_words)?;
        self.references.insert(id.to_string(), record);
        self.save()?;
        tracing::info!(id = %id, "added manual reference");
        self.get(id)
    }

    /// Replace the record at `old_id` with `updated`, moving it to `new_id`
    /// when the two differ. Tags, files and `created_at` always come from the
    /// existing record.
    pub fn rename(&mut self, old_id: &str, new_id: &str, updated: Record) -> Result<&Record> {
        let current = self.get(old_id)?;
        let renaming = old_id != new_id;
        if renaming && self.contains(new_id) {
            return Err(GitreferError::DuplicateReference(new_id.to_string()));
        }
        if current.is_doi && renaming {
            return Err(GitreferError::ImmutableDoi {
                old: old_id.to_string(),
                new: new_id.to_string(),
            });
        }
        if current.is_doi != updated.is_doi {
            return Err(GitreferError::ImmutableDoiFlag(old_id.to_string()));
        }
        if renaming && new_id.trim().is_empty() {
            return Err(GitreferError::ValidationError("reference id is empty".to_string()));
        }
        if renaming && validate_doi(new_id) {
            return Err(GitreferError::DoiShapedId(new_id.to_string()));
        }
        if renaming {
            self.ensure_free_slot(new_id, Some(old_id))?;
        }

        let mut updated = updated;
        updated.tags = current.tags.clone();
        updated.files = current.files.clone();
        updated.created_at = current.created_at;
        if updated.citekey.is_empty() {
            updated.citekey = updated.generate_citekey(new_id, self.title_words)?;
        }
        updated.touch();

        let same_slot = self.layout.data_dir(old_id) == self.layout.data_dir(new_id);
        if renaming && !same_slot {
            if let Err(e) = self.move_attachments(old_id, new_id) {
                tracing::error!(id = %old_id, new_id = %new_id, "moving attachments failed: {e}");
                return Err(GitreferError::partial(old_id, "move attachments", e));
            }
        }
        if renaming {
            self.references.shift_remove(old_id);
        }
        self.references.insert(new_id.to_string(), updated);
        self.save()?;
        tracing::info!(id = %old_id, new_id = %new_id, "updated reference");
        self.get(new_id)
    }

    fn move_attachments(&mut self, old_id: &str, new_id: &str) -> Result<()> {
        let entries = self.backend.list_directory(&self.layout.data_dir(old_id))?;
        let mut moved: Vec<(String, String)> = Vec::new();
        for entry in entries.into_iter().filter(|entry| entry.kind == EntryKind::File) {
            let target = self.layout.data_file(new_id, &entry.name);
            if let Err(e) = self.backend.move_file(&entry.path, &target) {
                self.roll_back_moves(&moved);
                return Err(e.into());
            }
            moved.push((entry.path, target));
        }
        Ok(())
    }

    fn roll_back_moves(&mut self, moved: &[(String, String)]) {
        for (source, target) in moved.iter().rev() {
            if let Err(e) = self.backend.move_file(target, source) {
                tracing::warn!(from = %target, to = %source, "rollback of moved attachment failed: {e}");
            }
        }
    }

    /// Remove a record with its attachments and raw shadow copy.
    pub fn delete(&mut self, id: &str) -> Result<Record> {
        let files = self.get(id)?.files.clone();

        for (done, name) in files.iter().enumerate() {
            let path = self.layout.data_file(id, name);
            let message = format!("Delete data file: {name} for {id}");
            if let Err(e) = self.backend.remove_file(&path, &message) {
                tracing::error!(id = %id, file = %name, "deleting attachment failed: {e}");
                let record = self.get_mut(id)?;
                record.files.drain(..done);
                record.touch();
                if let Err(save_err) = self.save() {
                    tracing::warn!(id = %id, "could not record partial delete: {save_err}");
                }
                return Err(GitreferError::partial(id, "delete attachments", e));
            }
        }

        let raw_path = self.layout.raw_file(id);
        if let Err(e) = self
            .backend
            .remove_file(&raw_path, &format!("Delete raw data for {id}"))
        {
            tracing::error!(id = %id, path = %raw_path, "deleting raw data failed: {e}");
            let record = self.get_mut(id)?;
            record.files.clear();
            record.touch();
            if let Err(save_err) = self.save() {
                tracing::warn!(id = %id, "could not record partial delete: {save_err}");
            }
            return Err(GitreferError::partial(id, "delete raw data", e));
        }

        let removed = self
            .references
            .shift_remove(id)
            .ok_or_else(|| GitreferError::ReferenceNotFound(id.to_string()))?;
        self.save()?;
        tracing::info!(id = %id, "deleted reference");
        Ok(removed)
    }

    pub fn add_tag(&mut self, id: &str, tag: &str) -> Result<TagChange> {
        let record = self.get_mut(id)?;
        if record.tags.iter().any(|existing| existing == tag) {
            tracing::warn!(id = %id, tag, "tag already exists");
            return Ok(TagChange::AlreadyPresent);
        }
        record.tags.push(tag.to_string());
        record.touch();
        self.save()?;
        tracing::info!(id = %id, tag, "added tag");
        Ok(TagChange::Added)
    }

    pub fn remove_tag(&mut self, id: &str, tag: &str) -> Result<TagChange> {
        let record = self.get_mut(id)?;
        let Some(position) = record.tags.iter().position(|existing| existing == tag) else {
            tracing::warn!(id = %id, tag, "tag not found");
            return Ok(TagChange::NotPresent);
        };
        record.tags.remove(position);
        record.touch();
        self.save()?;
        tracing::info!(id = %id, tag, "removed tag");
        Ok(TagChange::Removed)
    }

    /// Upload a local file into the record's attachment namespace.
    pub fn add_file(&mut self, id: &str, path: &Path) -> Result<String> {
        self.get(id)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| GitreferError::ValidationError(format!("not a file: {}", path.display())))?;
        self.ensure_new_file(id, &name)?;
        let content = std::fs::read(path)?;
        self.add_attachment(id, Attachment { name, content })
    }

    /// Upload in-memory content as an attachment.
    pub fn add_attachment(&mut self, id: &str, attachment: Attachment) -> Result<String> {
        self.get(id)?;
        self.ensure_new_file(id, &attachment.name)?;
        if attachment.content.is_empty() {
            return Err(GitreferError::EmptyFile(attachment.name));
        }
        let Attachment { name, content } = attachment;
        self.backend.write_file(
            &self.layout.data_file(id, &name),
            &content,
            &format!("Add data file: {name} for {id}"),
            None,
        )?;

        let record = self.get_mut(id)?;
        record.files.push(name.clone());
        record.touch();
        self.save()?;
        tracing::info!(id = %id, file = %name, bytes = content.len(), "added data file");
        Ok(name)
    }

    fn ensure_new_file(&self, id: &str, name: &str) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            return Err(GitreferError::ValidationError(format!("invalid file name: {name:?}")));
        }
        if self.get(id)?.files.iter().any(|file| file == name) {
            return Err(GitreferError::DuplicateFile {
                id: id.to_string(),
                file: name.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_attached(&self, id: &str, name: &str) -> Result<()> {
        if !self.get(id)?.files.iter().any(|file| file == name) {
            return Err(GitreferError::FileNotFound {
                id: id.to_string(),
                file: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_file(&mut self, id: &str, name: &str) -> Result<()> {
        self.ensure_attached(id, name)?;
        let removed = self.backend.remove_file(
            &self.layout.data_file(id, name),
            &format!("Delete data file: {name} for {id}"),
        )?;
        if !removed {
            tracing::warn!(id = %id, file = name, "attachment blob was already missing");
        }

        let record = self.get_mut(id)?;
        record.files.retain(|file| file != name);
        record.touch();
        self.save()?;
        tracing::info!(id = %id, file = name, "deleted data file");
        Ok(())
    }

    /// Rename an attachment; the new name goes to the end of `files`.
    pub fn rename_file(&mut self, id: &str, old_name: &str, new_name: &str) -> Result<()> {
        self.ensure_attached(id, old_name)?;
        self.ensure_new_file(id, new_name)?;
        self.backend.move_file(
            &self.layout.data_file(id, old_name),
            &self.layout.data_file(id, new_name),
        )?;

        let record = self.get_mut(id)?;
        record.files.retain(|file| file != old_name);
        record.files.push(new_name.to_string());
        record.touch();
        self.save()?;
        tracing::info!(id = %id, from = old_name, to = new_name, "renamed data file");
        Ok(())
    }

    /// `(id, text)` for every record carrying one of `tags` (all records when
    /// `tags` is empty), in store order.
    pub fn export(&self, style: &str, tags: &[String]) -> Result<Vec<(String, String)>> {
        let style: ExportStyle = style.parse()?;
        Ok(self
            .references
            .iter()
            .filter(|(_, record)| record.has_any_tag(tags))
            .map(|(id, record)| (id.clone(), style.render(id, record)))
            .collect())
    }

    /// Every file below the store root, depth first.
    pub fn tree(&self) -> Result<Vec<StorageEntry>> {
        Ok(self.backend.walk(self.layout.root())?)
    }

    /// Delete every attachment, every raw shadow copy and `references.json`.
    pub fn reset(&mut self) -> Result<()> {
        for entry in self.backend.walk(&self.layout.data_root())? {
            let message = format!("Delete data file: {}", entry.name);
            self.backend.remove_file(&entry.path, &message)?;
        }
        for entry in self.backend.walk(&self.layout.raw_dir())? {
            let message = format!("Delete raw data file: {}", entry.name);
            self.backend.remove_file(&entry.path, &message)?;
        }
        let path = self.layout.references_file();
        self.backend.remove_file(&path, &format!("Delete {}", file_name(&path)))?;
        self.references.clear();
        tracing::info!(root = self.layout.root(), "reset reference store");
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.references)?;
        let path = self.layout.references_file();
        self.backend
            .put_file(&path, json.as_bytes(), "Update references file")
            .map_err(|e| {
                tracing::error!(path = %path, "failed to save references: {e}");
                GitreferError::Unsaved(e)
            })
    }
}

fn parse_references(content: &[u8]) -> Result<IndexMap<String, Record>> {
    let raw: IndexMap<String, serde_json::Value> = serde_json::from_slice(content)?;
    raw.into_iter()
        .map(|(id, value)| {
            if let Some(key) = missing_key(&value) {
                return Err(GitreferError::ValidationError(format!(
                    "reference {id} is missing key {key}"
                )));
            }
            let record: Record = serde_json::from_value(value)?;
            Ok((id, record))
        })
        .collect()
}
