use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GitreferError;

/// BibTeX entry type of a reference. `Unspecified` serializes as `""`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntryType {
    Article,
    Book,
    Booklet,
    Conference,
    InBook,
    InCollection,
    InProceedings,
    Manual,
    MastersThesis,
    Misc,
    PhdThesis,
    Proceedings,
    TechReport,
    Unpublished,
    #[default]
    Unspecified,
}

impl EntryType {
    pub const ALL: [EntryType; 15] = [
        Self::Article,
        Self::Book,
        Self::Booklet,
        Self::Conference,
        Self::InBook,
        Self::InCollection,
        Self::InProceedings,
        Self::Manual,
        Self::MastersThesis,
        Self::Misc,
        Self::PhdThesis,
        Self::Proceedings,
        Self::TechReport,
        Self::Unpublished,
        Self::Unspecified,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Book => "book",
            Self::Booklet => "booklet",
            Self::Conference => "conference",
            Self::InBook => "inbook",
            Self::InCollection => "incollection",
            Self::InProceedings => "inproceedings",
            Self::Manual => "manual",
            Self::MastersThesis => "mastersthesis",
            Self::Misc => "misc",
            Self::PhdThesis => "phdthesis",
            Self::Proceedings => "proceedings",
            Self::TechReport => "techreport",
            Self::Unpublished => "unpublished",
            Self::Unspecified => "",
        }
    }

    /// BibTeX `@type` for export. Unspecified entries export as `misc`.
    pub fn bibtex_name(self) -> &'static str {
        match self {
            Self::Unspecified => "misc",
            other => other.as_str(),
        }
    }

    /// Translate a CrossRef work type into the BibTeX vocabulary.
    pub fn from_crossref_type(work_type: &str) -> Option<Self> {
        let mapped = match work_type {
            "" => Self::Unspecified,
            "journal-article" | "journal-issue" | "journal-volume" | "journal" => Self::Article,
            "book" | "monograph" | "edited-book" | "reference-book" | "book-set"
            | "book-series" | "book-track" => Self::Book,
            "book-chapter" | "book-part" | "book-section" => Self::InBook,
            "reference-entry" => Self::InCollection,
            "proceedings-article" => Self::InProceedings,
            "proceedings" | "proceedings-series" => Self::Proceedings,
            "dissertation" => Self::PhdThesis,
            "report" | "report-series" | "report-component" => Self::TechReport,
            "standard" | "standard-series" => Self::Manual,
            "posted-content" => Self::Unpublished,
            "dataset" | "component" | "peer-review" | "grant" | "database" | "other" => Self::Misc,
            other => return other.parse().ok(),
        };
        Some(mapped)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = GitreferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|entry_type| entry_type.as_str() == lowered)
            .ok_or_else(|| GitreferError::ValidationError(format!("unknown entry type: {s}")))
    }
}

impl TryFrom<String> for EntryType {
    type Error = GitreferError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_crossref_type(&value)
            .ok_or_else(|| GitreferError::ValidationError(format!("unknown entry type: {value}")))
    }
}

impl From<EntryType> for String {
    fn from(value: EntryType) -> Self {
        value.as_str().to_string()
    }
}
