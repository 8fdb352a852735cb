use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{Agency, RegistryMetadata, entry_type_or_misc, scalar, split_pages};
use crate::models::{Author, EntryType, Record};

static ARXIV_ABS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://arxiv\.org/abs/(\d+\.\d+(?:v\d+)?)").expect("valid arXiv regex")
});

/// The `data.attributes` object of a DataCite `/dois/{doi}` response.
/// DataCite has no month, edition, journal, ISBN or ISSN.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataciteAttributes {
    pub types: DataciteTypes,
    pub creators: Vec<DataciteCreator>,
    pub titles: Vec<DataciteTitle>,
    pub publication_year: Value,
    pub volume: Value,
    pub issue: Value,
    pub page: String,
    pub publisher: Option<DatacitePublisher>,
    pub descriptions: Vec<DataciteDescription>,
    pub subjects: Vec<DataciteSubject>,
    pub url: String,
    pub content_url: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataciteTypes {
    pub bibtex: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataciteCreator {
    pub family_name: Option<String>,
    pub given_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataciteTitle {
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataciteDescription {
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataciteSubject {
    pub subject: String,
}

/// Plain string in the REST API, `{ "name": ... }` in schema 4.5 payloads.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DatacitePublisher {
    Name(String),
    Object { name: String },
}

impl DatacitePublisher {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Object { name } => name,
        }
    }
}

impl DataciteAttributes {
    fn content_urls(&self) -> Vec<&str> {
        match &self.content_url {
            Value::String(url) => vec![url.as_str()],
            Value::Array(urls) => urls.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

impl RegistryMetadata for DataciteAttributes {
    fn to_record(&self, doi: &str) -> Record {
        let mut record = Record::new(true);
        let (firstpage, lastpage) = split_pages(&self.page);

        record.entry_type = if self.types.bibtex.is_empty() {
            EntryType::Unspecified
        } else {
            entry_type_or_misc(Agency::Datacite, &self.types.bibtex)
        };
        record.authors = self
            .creators
            .iter()
            .map(|creator| {
                let family = creator
                    .family_name
                    .clone()
                    .unwrap_or_else(|| creator.name.clone());
                Author::new(family, creator.given_name.clone())
            })
            .collect();
        record.title = self
            .titles
            .first()
            .map(|title| title.title.clone())
            .unwrap_or_default();
        record.year = scalar(&self.publication_year);
        record.volume = scalar(&self.volume);
        record.issue = scalar(&self.issue);
        record.firstpage = firstpage;
        record.lastpage = lastpage;
        record.publisher = self
            .publisher
            .as_ref()
            .map(|publisher| publisher.name().to_string())
            .unwrap_or_default();
        record.abstract_text = self
            .descriptions
            .first()
            .map(|description| description.description.clone())
            .unwrap_or_default();
        record.keywords = self
            .subjects
            .iter()
            .map(|subject| subject.subject.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        record.url = if self.url.is_empty() {
            format!("https://doi.org/{doi}")
        } else {
            self.url.clone()
        };
        record
    }

    /// A `.pdf` content URL, else an arXiv landing page turned into its PDF URL.
    fn pdf_link(&self) -> Option<String> {
        if let Some(url) = self.content_urls().into_iter().find(|url| url.ends_with(".pdf")) {
            return Some(url.to_string());
        }
        ARXIV_ABS
            .captures(&self.url)
            .map(|caps| format!("https://arxiv.org/pdf/{}", &caps[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arxiv() -> DataciteAttributes {
        serde_json::from_value(json!({
            "types": {"bibtex": "misc", "resourceTypeGeneral": "Preprint"},
            "creators": [
                {"name": "Doe, Jane", "familyName": "Doe", "givenName": "Jane"},
                {"name": "CERN", "nameType": "Organizational"}
            ],
            "titles": [{"title": "A Preprint"}, {"title": "Alt", "titleType": "AlternativeTitle"}],
            "publicationYear": 2024,
            "publisher": {"name": "arXiv"},
            "descriptions": [{"description": "We study things."}],
            "subjects": [{"subject": "cs.LG"}, {"subject": "stat.ML"}],
            "url": "https://arxiv.org/abs/2401.17231"
        }))
        .unwrap()
    }

    #[test]
    fn maps_fields() {
        let record = arxiv().to_record("10.48550/arXiv.2401.17231");
        assert!(record.is_doi);
        assert_eq!(record.entry_type, EntryType::Misc);
        assert_eq!(record.authors[0], Author::new("Doe", "Jane"));
        assert_eq!(record.authors[1], Author::new("CERN", ""));
        assert_eq!(record.title, "A Preprint");
        assert_eq!(record.year, "2024");
        assert_eq!(record.month, "");
        assert_eq!(record.journal, "");
        assert_eq!(record.publisher, "arXiv");
        assert_eq!(record.abstract_text, "We study things.");
        assert_eq!(record.keywords, "cs.LG, stat.ML");
        assert_eq!(record.url, "https://arxiv.org/abs/2401.17231");
    }

    #[test]
    fn publisher_as_plain_string() {
        let attrs: DataciteAttributes =
            serde_json::from_value(json!({"publisher": "Zenodo", "publicationYear": "2020"}))
                .unwrap();
        let record = attrs.to_record("10.5281/zenodo.1");
        assert_eq!(record.publisher, "Zenodo");
        assert_eq!(record.year, "2020");
        assert_eq!(record.url, "https://doi.org/10.5281/zenodo.1");
        assert_eq!(record.entry_type, EntryType::Unspecified);
    }

    #[test]
    fn pdf_link_from_arxiv_url() {
        assert_eq!(
            arxiv().pdf_link().as_deref(),
            Some("https://arxiv.org/pdf/2401.17231")
        );
    }

    #[test]
    fn pdf_link_prefers_content_url() {
        let attrs: DataciteAttributes = serde_json::from_value(json!({
            "contentUrl": ["https://zenodo.org/data.csv", "https://zenodo.org/paper.pdf"],
            "url": "https://arxiv.org/abs/2401.17231"
        }))
        .unwrap();
        assert_eq!(attrs.pdf_link().as_deref(), Some("https://zenodo.org/paper.pdf"));
        assert!(DataciteAttributes::default().pdf_link().is_none());
    }
}
