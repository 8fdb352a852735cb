//! Mapping of DOI registry responses into [`Record`]s.
//!
//! A response is tagged with the agency that produced it and parsed once into
//! that agency's typed shape; both shapes implement [`RegistryMetadata`].

pub mod crossref;
pub mod datacite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GitreferError, Result};
use crate::models::{EntryType, Record};
pub use crossref::CrossrefWork;
pub use datacite::DataciteAttributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agency {
    Crossref,
    Datacite,
}

impl Agency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crossref => "crossref",
            Self::Datacite => "datacite",
        }
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Agency {
    type Err = GitreferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crossref" => Ok(Self::Crossref),
            "datacite" => Ok(Self::Datacite),
            _ => Err(GitreferError::UnsupportedAgency(s.to_string())),
        }
    }
}

/// Verbatim registry payload (`message` for CrossRef, `data.attributes` for
/// DataCite) together with the agency that served it.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryResponse {
    pub agency: Agency,
    pub raw: serde_json::Value,
}

/// Shared view over the agency-specific response shapes.
pub trait RegistryMetadata {
    /// Bibliographic fields as a DOI record. Citekey, tags, files and
    /// timestamps are left to the caller.
    fn to_record(&self, doi: &str) -> Record;

    /// Direct link to a PDF of the work, when the registry exposes one.
    fn pdf_link(&self) -> Option<String>;
}

impl RegistryResponse {
    pub fn new(agency: Agency, raw: serde_json::Value) -> Self {
        Self { agency, raw }
    }

    pub fn metadata(&self) -> Result<Box<dyn RegistryMetadata>> {
        Ok(match self.agency {
            Agency::Crossref => Box::new(CrossrefWork::deserialize(&self.raw)?),
            Agency::Datacite => Box::new(DataciteAttributes::deserialize(&self.raw)?),
        })
    }

    /// Build the stored record for `doi` with `files` already attached.
    pub fn to_record(&self, doi: &str, files: Vec<String>, title_words: usize) -> Result<Record> {
        let mut record = self.metadata()?.to_record(doi);
        record.files = files;
        record.citekey = record.generate_citekey(doi, title_words)?;
        Ok(record)
    }

    pub fn pdf_link(&self) -> Option<String> {
        match self.metadata() {
            Ok(metadata) => metadata.pdf_link(),
            Err(e) => {
                tracing::warn!(agency = %self.agency, "unreadable registry payload: {e}");
                None
            }
        }
    }
}

/// Registry scalars arrive as strings or numbers; anything else is empty.
pub(crate) fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// `"12-34"` → (`"12"`, `"34"`); a single page fills both.
pub(crate) fn split_pages(page: &str) -> (String, String) {
    if page.is_empty() {
        return (String::new(), String::new());
    }
    let first = page.split('-').next().unwrap_or(page);
    let last = page.rsplit('-').next().unwrap_or(page);
    (first.to_string(), last.to_string())
}

pub(crate) fn entry_type_or_misc(agency: Agency, value: &str) -> EntryType {
    EntryType::from_crossref_type(value).unwrap_or_else(|| {
        tracing::warn!(%agency, entry_type = value, "unknown entry type, using misc");
        EntryType::Misc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agency_parse() {
        assert_eq!("crossref".parse::<Agency>().unwrap(), Agency::Crossref);
        assert_eq!("DataCite".parse::<Agency>().unwrap(), Agency::Datacite);
        let err = "medra".parse::<Agency>().unwrap_err();
        assert!(matches!(err, GitreferError::UnsupportedAgency(_)));
    }

    #[test]
    fn scalars_and_pages() {
        assert_eq!(scalar(&json!(12)), "12");
        assert_eq!(scalar(&json!("4a")), "4a");
        assert_eq!(scalar(&json!(null)), "");
        assert_eq!(split_pages("100-110"), ("100".into(), "110".into()));
        assert_eq!(split_pages("e42"), ("e42".into(), "e42".into()));
        assert_eq!(split_pages(""), (String::new(), String::new()));
    }

    #[test]
    fn to_record_generates_citekey_and_files() {
        let response = RegistryResponse::new(
            Agency::Crossref,
            json!({
                "type": "journal-article",
                "author": [{"family": "Smith", "given": "J"}],
                "title": ["Deep Learning Systems"],
                "published-print": {"date-parts": [[2020, 5]]}
            }),
        );
        let record = response
            .to_record("10.1/xyz", vec!["paper.pdf".into()], 1)
            .unwrap();
        assert!(record.is_doi);
        assert_eq!(record.citekey, "smith2020deep");
        assert_eq!(record.files, vec!["paper.pdf".to_string()]);
    }

    #[test]
    fn incomplete_metadata_falls_back_to_doi_citekey() {
        let response = RegistryResponse::new(Agency::Datacite, json!({"titles": []}));
        let record = response.to_record("10.5281/zenodo.1", Vec::new(), 1).unwrap();
        assert_eq!(record.citekey, "Gitrefer:10.5281_zenodo.1");
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let response = RegistryResponse::new(Agency::Crossref, json!({"author": "nobody"}));
        assert!(response.to_record("10.1/x", Vec::new(), 1).is_err());
        assert!(response.pdf_link().is_none());
    }
}
