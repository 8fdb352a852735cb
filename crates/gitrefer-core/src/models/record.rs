use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry_type::EntryType;
use super::timestamp;
use crate::citekey::citekey_or_fallback;
use crate::error::Result;

/// Keys every stored record must carry.
pub const REQUIRED_KEYS: [&str; 23] = [
    "is_doi",
    "entry_type",
    "citekey",
    "authors",
    "title",
    "year",
    "month",
    "edition",
    "journal",
    "volume",
    "issue",
    "firstpage",
    "lastpage",
    "publisher",
    "isbn",
    "issn",
    "abstract",
    "keywords",
    "url",
    "tags",
    "files",
    "created_at",
    "updated_at",
];

/// First required key missing from a raw record, if any.
pub fn missing_key(value: &serde_json::Value) -> Option<&'static str> {
    let Some(object) = value.as_object() else {
        return Some(REQUIRED_KEYS[0]);
    };
    REQUIRED_KEYS.into_iter().find(|key| !object.contains_key(*key))
}

/// Whether a raw record carries every required key.
pub fn validate(value: &serde_json::Value) -> bool {
    missing_key(value).is_none()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub given: String,
}

impl Author {
    pub fn new(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            given: given.into(),
        }
    }

    /// Parse `"Family, Given"`; without a comma the whole input is the family name.
    pub fn parse(input: &str) -> Self {
        match input.split_once(',') {
            Some((family, given)) => Self::new(family.trim(), given.trim()),
            None => Self::new(input.trim(), ""),
        }
    }

    pub fn initial(&self) -> Option<char> {
        self.given.chars().next()
    }
}

/// One stored reference. The id is the key it is stored under, not a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub is_doi: bool,
    pub entry_type: EntryType,
    pub citekey: String,
    pub authors: Vec<Author>,
    pub title: String,
    pub year: String,
    pub month: String,
    pub edition: String,
    pub journal: String,
    pub volume: String,
    pub issue: String,
    pub firstpage: String,
    pub lastpage: String,
    pub publisher: String,
    pub isbn: Vec<String>,
    pub issn: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    pub url: String,
    pub tags: Vec<String>,
    pub files: Vec<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied bibliographic fields for a manual record or an update.
/// Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManualFields {
    pub entry_type: EntryType,
    pub citekey: String,
    pub authors: Vec<Author>,
    pub title: String,
    pub year: String,
    pub month: String,
    pub edition: String,
    pub journal: String,
    pub volume: String,
    pub issue: String,
    pub firstpage: String,
    pub lastpage: String,
    pub publisher: String,
    pub isbn: Vec<String>,
    pub issn: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    pub url: String,
}

impl Record {
    /// Empty record with both timestamps set to now.
    pub fn new(is_doi: bool) -> Self {
        let now = Utc::now();
        Self {
            is_doi,
            entry_type: EntryType::Unspecified,
            citekey: String::new(),
            authors: Vec::new(),
            title: String::new(),
            year: String::new(),
            month: String::new(),
            edition: String::new(),
            journal: String::new(),
            volume: String::new(),
            issue: String::new(),
            firstpage: String::new(),
            lastpage: String::new(),
            publisher: String::new(),
            isbn: Vec::new(),
            issn: Vec::new(),
            abstract_text: String::new(),
            keywords: String::new(),
            url: String::new(),
            tags: Vec::new(),
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a non-DOI record. A blank citekey is generated from the first
    /// author, year and title, or falls back to the id-based key.
    pub fn manual(id: &str, fields: ManualFields, title_words: usize) -> Result<Self> {
        let mut record = Self::new(false);
        record.apply(fields);
        if record.citekey.is_empty() {
            record.citekey = record.generate_citekey(id, title_words)?;
        }
        Ok(record)
    }

    pub(crate) fn generate_citekey(&self, id: &str, title_words: usize) -> Result<String> {
        citekey_or_fallback(
            id,
            self.first_family(),
            &self.year,
            &self.title,
            title_words,
        )
    }

    pub fn first_family(&self) -> Option<&str> {
        self.authors.first().map(|author| author.family.as_str())
    }

    /// Overlay every non-empty field of `fields` onto this record.
    pub fn apply(&mut self, fields: ManualFields) {
        fn overlay(target: &mut String, value: String) {
            if !value.is_empty() {
                *target = value;
            }
        }
        fn overlay_list<T>(target: &mut Vec<T>, value: Vec<T>) {
            if !value.is_empty() {
                *target = value;
            }
        }

        if fields.entry_type != EntryType::Unspecified {
            self.entry_type = fields.entry_type;
        }
        overlay(&mut self.citekey, fields.citekey);
        overlay_list(&mut self.authors, fields.authors);
        overlay(&mut self.title, fields.title);
        overlay(&mut self.year, fields.year);
        overlay(&mut self.month, fields.month);
        overlay(&mut self.edition, fields.edition);
        overlay(&mut self.journal, fields.journal);
        overlay(&mut self.volume, fields.volume);
        overlay(&mut self.issue, fields.issue);
        overlay(&mut self.firstpage, fields.firstpage);
        overlay(&mut self.lastpage, fields.lastpage);
        overlay(&mut self.publisher, fields.publisher);
        overlay_list(&mut self.isbn, fields.isbn);
        overlay_list(&mut self.issn, fields.issn);
        overlay(&mut self.abstract_text, fields.abstract_text);
        overlay(&mut self.keywords, fields.keywords);
        overlay(&mut self.url, fields.url);
    }

    /// `first-last`, or `first` alone when there is no distinct last page.
    pub fn pages(&self) -> String {
        match (self.firstpage.is_empty(), self.lastpage.is_empty()) {
            (false, false) if self.firstpage != self.lastpage => {
                format!("{}-{}", self.firstpage, self.lastpage)
            }
            (false, _) => self.firstpage.clone(),
            (true, _) => String::new(),
        }
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.is_empty() || tags.iter().any(|tag| self.tags.contains(tag))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
