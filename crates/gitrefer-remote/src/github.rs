//! [`StorageBackend`] over the GitHub repository contents API.
//!
//! Every write is one commit. Updates and deletes carry the blob `sha`
//! returned by the last read, which is the storage version token.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gitrefer_core::{EntryKind, StorageBackend, StorageEntry, StorageError, StorageResult, StoredFile};
use reqwest::blocking::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, Result};
use crate::http::HttpClient;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("gitrefer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ContentFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteBody<'a> {
    message: &'a str,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

pub struct GitHubStorage {
    http: HttpClient,
    api_base: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
}

impl GitHubStorage {
    pub fn new(repo: &str, token: Option<String>) -> Result<Self> {
        Self::with_base(DEFAULT_API_BASE, repo, token)
    }

    pub fn with_base(api_base: &str, repo: &str, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(USER_AGENT, Duration::from_secs(60))?,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo: repo.trim_matches('/').to_string(),
            branch: None,
            token,
        })
    }

    /// Commit to `branch` instead of the repository's default branch.
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch.filter(|b| !b.is_empty());
        self
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/repos/{}/contents/{}", self.api_base, self.repo, encoded.join("/"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }

    /// GET a contents URL; `Ok(None)` on 404.
    fn get_contents(&self, path: &str) -> Result<Option<serde_json::Value>> {
        let url = self.contents_url(path);
        let response = self.http.send(&url, |client| {
            let request = self.authorize(client.get(&url));
            match &self.branch {
                Some(branch) => request.query(&[("ref", branch)]),
                None => request,
            }
        });
        match response {
            Ok(r) => Ok(Some(r.json()?)),
            Err(RemoteError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn decode(&self, path: &str, file: ContentFile) -> Result<Vec<u8>> {
        let packed: String = file.content.chars().filter(|c| !c.is_whitespace()).collect();
        if packed.is_empty() {
            // Files over 1 MB come back without inline content.
            if let Some(url) = file.download_url.filter(|u| !u.is_empty()) {
                tracing::debug!(path, "fetching content from download_url");
                return self.http.send(&url, |client| self.authorize(client.get(&url)))?
                    .bytes()
                    .map(|b| b.to_vec())
                    .map_err(RemoteError::from);
            }
            return Ok(Vec::new());
        }
        STANDARD
            .decode(packed.as_bytes())
            .map_err(|e| RemoteError::Parse(format!("base64 content of {path}: {e}")))
    }
}

fn write_error(path: &str, err: RemoteError, creating: bool) -> StorageError {
    match err {
        // The contents API answers 422 when creating over an existing file
        // and 409 when the sha is stale.
        RemoteError::Api { status: 422, .. } if creating => StorageError::AlreadyExists(path.to_string()),
        RemoteError::Api { status: 409 | 422, .. } => StorageError::Conflict(path.to_string()),
        RemoteError::Api { status: 404, .. } => StorageError::NotFound(path.to_string()),
        other => other.into(),
    }
}

impl StorageBackend for GitHubStorage {
    fn read_file(&self, path: &str) -> StorageResult<Option<StoredFile>> {
        let Some(value) = self.get_contents(path)? else {
            return Ok(None);
        };
        if value.is_array() {
            return Err(StorageError::Backend(format!("{path} is a directory")));
        }
        let file: ContentFile = serde_json::from_value(value)
            .map_err(|e| StorageError::Backend(format!("unexpected contents response for {path}: {e}")))?;
        let version = file.sha.clone();
        let content = self.decode(path, file)?;
        Ok(Some(StoredFile { content, version }))
    }

    fn write_file(
        &mut self,
        path: &str,
        content: &[u8],
        message: &str,
        version: Option<&str>,
    ) -> StorageResult<()> {
        let url = self.contents_url(path);
        let body = WriteBody {
            message,
            content: STANDARD.encode(content),
            sha: version,
            branch: self.branch.as_deref(),
        };
        self.http
            .send(&url, |client| self.authorize(client.put(&url)).json(&body))
            .map_err(|e| write_error(path, e, version.is_none()))?;
        tracing::debug!(path, message, "committed file");
        Ok(())
    }

    fn delete_file(&mut self, path: &str, message: &str, version: &str) -> StorageResult<()> {
        let url = self.contents_url(path);
        let body = DeleteBody {
            message,
            sha: version,
            branch: self.branch.as_deref(),
        };
        self.http
            .send(&url, |client| self.authorize(client.delete(&url)).json(&body))
            .map_err(|e| write_error(path, e, false))?;
        tracing::debug!(path, message, "deleted file");
        Ok(())
    }

    fn list_directory(&self, path: &str) -> StorageResult<Vec<StorageEntry>> {
        let Some(value) = self.get_contents(path)? else {
            return Ok(Vec::new());
        };
        let items: Vec<ContentItem> = serde_json::from_value(value)
            .map_err(|e| StorageError::Backend(format!("{path} is not a directory: {e}")))?;
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => return None,
                };
                Some(StorageEntry { name: item.name, path: item.path, kind })
            })
            .collect())
    }
}
