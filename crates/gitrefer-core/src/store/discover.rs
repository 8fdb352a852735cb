//! Discovery of cited works that are not yet in the store, from the
//! `reference` lists of stored CrossRef responses.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::ReferenceStore;
use crate::error::Result;
use crate::storage::{EntryKind, StorageBackend};

/// Keys left out of the descriptive summary of a cited work.
pub const EXCLUDED_REFERENCE_KEYS: [&str; 5] = ["DOI", "key", "doi-asserted-by", "first-page", "volume"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReference {
    /// `None` for citations without a DOI.
    pub doi: Option<String>,
    /// `key: value` pairs describing the citation.
    pub info: Vec<String>,
    /// Number of stored works citing it.
    pub count: usize,
}

fn describe(entry: &serde_json::Map<String, Value>) -> Vec<String> {
    entry
        .iter()
        .filter(|(key, _)| !EXCLUDED_REFERENCE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}: {text}"),
            other => format!("{key}: {other}"),
        })
        .collect()
}

/// Aggregate the citations of `raw_documents`, skipping DOIs in `registered`
/// (compared case-insensitively).
///
/// A DOI cited by several documents is counted once per citation and
/// described by its most detailed variant, the first one on ties. DOIs come
/// out by descending count, first-seen order among equals, followed by every
/// citation without a DOI.
pub fn collect_new_references<'a>(
    raw_documents: impl IntoIterator<Item = &'a Value>,
    registered: &HashSet<String>,
) -> Vec<NewReference> {
    let mut by_doi: IndexMap<String, NewReference> = IndexMap::new();
    let mut without_doi = Vec::new();

    for document in raw_documents {
        let Some(citations) = document.get("reference").and_then(Value::as_array) else {
            continue;
        };
        for entry in citations.iter().filter_map(Value::as_object) {
            let info = describe(entry);
            let doi = entry.get("DOI").and_then(Value::as_str).filter(|doi| !doi.is_empty());
            let Some(doi) = doi else {
                without_doi.push(NewReference { doi: None, info, count: 1 });
                continue;
            };
            let folded = doi.to_lowercase();
            if registered.contains(&folded) {
                continue;
            }
            match by_doi.get_mut(&folded) {
                Some(existing) => {
                    existing.count += 1;
                    if info.len() > existing.info.len() {
                        existing.info = info;
                    }
                }
                None => {
                    by_doi.insert(folded, NewReference { doi: Some(doi.to_string()), info, count: 1 });
                }
            }
        }
    }

    let mut found: Vec<NewReference> = by_doi.into_values().collect();
    found.sort_by(|a, b| b.count.cmp(&a.count));
    found.extend(without_doi);
    found
}

impl<S: StorageBackend> ReferenceStore<S> {
    /// Works cited by stored CrossRef records that are not in the store yet.
    pub fn find_new_references(&self) -> Result<Vec<NewReference>> {
        let registered: HashSet<String> = self
            .references
            .iter()
            .filter(|(_, record)| record.is_doi)
            .map(|(id, _)| id.to_lowercase())
            .collect();

        let mut documents = Vec::new();
        for entry in self.backend.list_directory(&self.layout.raw_dir())? {
            if entry.kind != EntryKind::File || !entry.name.ends_with(".json") {
                continue;
            }
            let Some(file) = self.backend.read_file(&entry.path)? else {
                continue;
            };
            match serde_json::from_slice::<Value>(&file.content) {
                Ok(document) => documents.push(document),
                Err(e) => tracing::warn!(path = %entry.path, "skipping unreadable raw data: {e}"),
            }
        }

        let found = collect_new_references(&documents, &registered);
        tracing::info!(count = found.len(), scanned = documents.len(), "searched raw data for new references");
        Ok(found)
    }
}
