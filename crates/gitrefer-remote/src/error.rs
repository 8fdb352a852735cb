use gitrefer_core::{ErrorKind, GitreferError, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {url}: HTTP {status}: {body}")]
    Api { url: String, status: u16, body: String },

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),

    #[error(transparent)]
    Core(#[from] GitreferError),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { status: 404, .. } => ErrorKind::NotFound,
            Self::Core(err) => err.kind(),
            Self::Http(_)
            | Self::Api { .. }
            | Self::RateLimit(..)
            | Self::Parse(_)
            | Self::PdfExtraction(_) => ErrorKind::UpstreamFailure,
        }
    }
}

impl From<RemoteError> for StorageError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Api { url, status: 404, .. } => StorageError::NotFound(url),
            RemoteError::Api { url, status: 409, .. } => StorageError::Conflict(url),
            other => StorageError::Backend(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
