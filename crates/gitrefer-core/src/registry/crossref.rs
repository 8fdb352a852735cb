use serde::Deserialize;
use serde_json::Value;

use super::{Agency, RegistryMetadata, entry_type_or_misc, scalar, split_pages};
use crate::models::{Author, Record};

/// The `message` object of a CrossRef `/works/{doi}` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefWork {
    #[serde(rename = "type")]
    pub work_type: String,
    pub author: Vec<CrossrefAuthor>,
    pub title: Vec<String>,
    #[serde(rename = "published-print")]
    pub published_print: Option<CrossrefDate>,
    #[serde(rename = "published-online")]
    pub published_online: Option<CrossrefDate>,
    #[serde(rename = "edition-number")]
    pub edition_number: Value,
    #[serde(rename = "container-title")]
    pub container_title: Vec<String>,
    pub volume: Value,
    pub issue: Value,
    pub page: String,
    pub publisher: String,
    #[serde(rename = "ISBN")]
    pub isbn: Vec<String>,
    #[serde(rename = "ISSN")]
    pub issn: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub subject: Vec<String>,
    pub resource: Option<CrossrefResource>,
    pub link: Vec<CrossrefLink>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefAuthor {
    pub family: Option<String>,
    pub given: String,
    /// Organizational authors carry only a name.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefDate {
    #[serde(rename = "date-parts")]
    pub date_parts: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefResource {
    pub primary: Option<CrossrefPrimary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefPrimary {
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrossrefLink {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "content-type")]
    pub content_type: String,
}

impl CrossrefWork {
    /// Year and month from `published-print`, else `published-online`.
    fn year_month(&self) -> (String, String) {
        let parts = self
            .published_print
            .as_ref()
            .or(self.published_online.as_ref())
            .and_then(|date| date.date_parts.first());
        match parts {
            Some(parts) => (
                parts.first().map(scalar).unwrap_or_default(),
                parts.get(1).map(scalar).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        }
    }
}

impl RegistryMetadata for CrossrefWork {
    fn to_record(&self, doi: &str) -> Record {
        let mut record = Record::new(true);
        let (year, month) = self.year_month();
        let (firstpage, lastpage) = split_pages(&self.page);

        record.entry_type = entry_type_or_misc(Agency::Crossref, &self.work_type);
        record.authors = self
            .author
            .iter()
            .map(|author| {
                let family = author
                    .family
                    .clone()
                    .or_else(|| author.name.clone())
                    .unwrap_or_default();
                Author::new(family, author.given.clone())
            })
            .collect();
        record.title = self.title.first().cloned().unwrap_or_default();
        record.year = year;
        record.month = month;
        record.edition = scalar(&self.edition_number);
        record.journal = self.container_title.first().cloned().unwrap_or_default();
        record.volume = scalar(&self.volume);
        record.issue = scalar(&self.issue);
        record.firstpage = firstpage;
        record.lastpage = lastpage;
        record.publisher = self.publisher.clone();
        record.isbn = self.isbn.clone();
        record.issn = self.issn.clone();
        record.abstract_text = self.abstract_text.clone();
        record.keywords = self.subject.join(", ");
        record.url = self
            .resource
            .as_ref()
            .and_then(|resource| resource.primary.as_ref())
            .map(|primary| primary.url.clone())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("https://doi.org/{doi}"));
        record
    }

    fn pdf_link(&self) -> Option<String> {
        self.link
            .iter()
            .find(|link| matches!(link.content_type.as_str(), "application/pdf" | "unspecified"))
            .map(|link| link.url.clone())
            .filter(|url| !url.is_empty())
    }
}
