//! CrossRef and DataCite lookups.
//!
//! The agency for a DOI comes from the CrossRef agency endpoint; the work
//! itself is then fetched from whichever registry serves it.

use std::time::Duration;

use gitrefer_core::config::RegistryConfig;
use gitrefer_core::{Agency, Attachment, RegistryResponse};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{RemoteError, Result};
use crate::http::HttpClient;

#[derive(Debug, Deserialize)]
struct AgencyEnvelope {
    message: AgencyMessage,
}

#[derive(Debug, Deserialize)]
struct AgencyMessage {
    agency: AgencyId,
}

#[derive(Debug, Deserialize)]
struct AgencyId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CrossrefEnvelope {
    message: Value,
}

#[derive(Debug, Deserialize)]
struct DataciteEnvelope {
    data: DataciteData,
}

#[derive(Debug, Deserialize)]
struct DataciteData {
    attributes: Value,
}

pub struct RegistryClient {
    http: HttpClient,
    crossref_base: String,
    datacite_base: String,
}

fn user_agent(polite_email: Option<&str>) -> String {
    let base = concat!("gitrefer/", env!("CARGO_PKG_VERSION"));
    match polite_email {
        Some(email) if !email.is_empty() => format!("{base} (mailto:{email})"),
        _ => base.to_string(),
    }
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let http = HttpClient::new(
            &user_agent(config.polite_email.as_deref()),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            http,
            crossref_base: config.crossref_base.trim_end_matches('/').to_string(),
            datacite_base: config.datacite_base.trim_end_matches('/').to_string(),
        })
    }

    /// Registration agency of `doi`. Agencies other than CrossRef and
    /// DataCite are rejected.
    pub fn agency(&self, doi: &str) -> Result<Agency> {
        let url = format!("{}/works/{doi}/agency", self.crossref_base);
        let envelope: AgencyEnvelope = self.http.get_json(&url)?;
        tracing::debug!(doi, agency = %envelope.message.agency.id, "resolved agency");
        Ok(envelope.message.agency.id.parse()?)
    }

    /// Look up the agency, then fetch the work from it.
    pub fn fetch(&self, doi: &str) -> Result<RegistryResponse> {
        let agency = self.agency(doi)?;
        self.fetch_from(agency, doi)
    }

    pub fn fetch_from(&self, agency: Agency, doi: &str) -> Result<RegistryResponse> {
        let raw = match agency {
            Agency::Crossref => {
                let url = format!("{}/works/{doi}", self.crossref_base);
                self.http.get_json::<CrossrefEnvelope>(&url)?.message
            }
            Agency::Datacite => {
                let url = format!("{}/dois/{doi}", self.datacite_base);
                self.http.get_json::<DataciteEnvelope>(&url)?.data.attributes
            }
        };
        if !raw.is_object() {
            return Err(RemoteError::Parse(format!("{agency} returned no metadata for {doi}")));
        }
        tracing::info!(doi, %agency, "fetched registry metadata");
        Ok(RegistryResponse::new(agency, raw))
    }

    pub fn download(&self, url: &str) -> Result<Attachment> {
        let content = self.http.get_bytes(url)?;
        Ok(Attachment {
            name: pdf_file_name(url),
            content,
        })
    }

    /// Download the PDF the registry links to. Missing links and failed
    /// downloads are logged and yield `None`.
    pub fn download_pdf(&self, doi: &str, response: &RegistryResponse) -> Option<Attachment> {
        let Some(link) = response.pdf_link() else {
            tracing::warn!(doi, "no PDF link in registry metadata; add the PDF manually if needed");
            return None;
        };
        match self.download(&link) {
            Ok(attachment) if attachment.content.is_empty() => {
                tracing::warn!(doi, url = %link, "downloaded PDF is empty");
                None
            }
            Ok(attachment) => {
                tracing::info!(doi, file = %attachment.name, "downloaded PDF");
                Some(attachment)
            }
            Err(e) => {
                tracing::warn!(doi, url = %link, "PDF download failed: {e}");
                None
            }
        }
    }
}

/// Attachment name for a download: the last path segment of `url`, with a
/// `.pdf` suffix added when missing.
pub fn pdf_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let last = if last.is_empty() || last.contains(':') { "download" } else { last };
    if last.to_ascii_lowercase().ends_with(".pdf") {
        last.to_string()
    } else {
        format!("{last}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitrefer_core::GitreferError;
    use serde_json::json;

    fn client(server: &mockito::Server) -> RegistryClient {
        RegistryClient::new(&RegistryConfig {
            crossref_base: server.url(),
            datacite_base: format!("{}/datacite", server.url()),
            polite_email: Some("alice@example.org".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn agency_body(id: &str) -> String {
        json!({"status": "ok", "message": {"DOI": "x", "agency": {"id": id, "label": id}}}).to_string()
    }

    #[test]
    fn crossref_work_is_fetched_from_message() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/works/10.1000/xyz123/agency")
            .match_header("user-agent", mockito::Matcher::Regex("mailto:alice@example.org".into()))
            .with_body(agency_body("crossref"))
            .create();
        server
            .mock("GET", "/works/10.1000/xyz123")
            .with_body(json!({"status": "ok", "message": {"title": ["Deep Learning"], "type": "journal-article"}}).to_string())
            .create();

        let response = client(&server).fetch("10.1000/xyz123").unwrap();
        assert_eq!(response.agency, Agency::Crossref);
        assert_eq!(response.raw["title"][0], "Deep Learning");
    }

    #[test]
    fn datacite_work_is_fetched_from_attributes() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/works/10.5281/zenodo.1/agency").with_body(agency_body("datacite")).create();
        server
            .mock("GET", "/datacite/dois/10.5281/zenodo.1")
            .with_body(json!({"data": {"id": "10.5281/zenodo.1", "attributes": {"publicationYear": 2021}}}).to_string())
            .create();

        let response = client(&server).fetch("10.5281/zenodo.1").unwrap();
        assert_eq!(response.agency, Agency::Datacite);
        assert_eq!(response.raw["publicationYear"], 2021);
    }

    #[test]
    fn other_agencies_are_rejected() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/works/10.3030/abc/agency").with_body(agency_body("medra")).create();

        let err = client(&server).fetch("10.3030/abc").unwrap_err();
        assert!(matches!(err, RemoteError::Core(GitreferError::UnsupportedAgency(_))));
    }

    #[test]
    fn unknown_doi_is_not_found() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/works/10.9999/nope/agency").with_status(404).with_body("Resource not found.").create();

        let err = client(&server).agency("10.9999/nope").unwrap_err();
        assert_eq!(err.kind(), gitrefer_core::ErrorKind::NotFound);
    }

    #[test]
    fn pdf_is_downloaded_from_registry_link() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/files/paper").with_body("%PDF-1.4").create();
        let response = RegistryResponse::new(
            Agency::Crossref,
            json!({"link": [{"URL": format!("{}/files/paper", server.url()), "content-type": "application/pdf"}]}),
        );

        let attachment = client(&server).download_pdf("10.1/x", &response).unwrap();
        assert_eq!(attachment.name, "paper.pdf");
        assert_eq!(attachment.content, b"%PDF-1.4");
    }

    #[test]
    fn failed_download_yields_none() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/files/paper.pdf").with_status(403).create();
        let response = RegistryResponse::new(
            Agency::Crossref,
            json!({"link": [{"URL": format!("{}/files/paper.pdf", server.url()), "content-type": "application/pdf"}]}),
        );

        assert!(client(&server).download_pdf("10.1/x", &response).is_none());
        assert!(client(&server).download_pdf("10.1/x", &RegistryResponse::new(Agency::Crossref, json!({}))).is_none());
    }

    #[test]
    fn file_names_from_urls() {
        assert_eq!(pdf_file_name("https://arxiv.org/pdf/2401.17231"), "2401.17231.pdf");
        assert_eq!(pdf_file_name("https://host/a/paper.PDF"), "paper.PDF");
        assert_eq!(pdf_file_name("https://host/a/fulltext?download=1"), "fulltext.pdf");
        assert_eq!(pdf_file_name("https://host/a/b/"), "b.pdf");
    }
}
