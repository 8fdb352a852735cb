use thiserror::Error;

use crate::storage::StorageError;

/// All errors that can occur in gitrefer-core.
#[derive(Debug, Error)]
pub enum GitreferError {
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Data file {file} not found for reference {id}")]
    FileNotFound { id: String, file: String },

    #[error("Reference already exists: {0}")]
    DuplicateReference(String),

    #[error("Reference {id} would share storage with existing reference {existing}")]
    StorageCollision { id: String, existing: String },

    #[error("Data file {file} already exists for reference {id}")]
    DuplicateFile { id: String, file: String },

    #[error("Invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("ID cannot be a DOI or DOI-like string: {0}")]
    DoiShapedId(String),

    #[error("Unsupported format: {0}. Supported formats are: bibtex, apa, ris")]
    UnsupportedStyle(String),

    #[error("Unsupported agency: {0}")]
    UnsupportedAgency(String),

    #[error("Data file is empty: {0}")]
    EmptyFile(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("DOI cannot be changed: {old} -> {new}")]
    ImmutableDoi { old: String, new: String },

    #[error("DOI status cannot be changed for reference {0}")]
    ImmutableDoiFlag(String),

    #[error("Title did not converge after {0} simplification passes")]
    NoConvergence(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("References changed in memory but could not be saved: {0}")]
    Unsaved(#[source] StorageError),

    #[error("{step} failed for {id}: {source}")]
    Partial {
        id: String,
        step: &'static str,
        #[source]
        source: Box<GitreferError>,
    },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Coarse classification of [`GitreferError`] used by callers to decide how
/// to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidInput,
    ImmutableFieldViolation,
    UpstreamFailure,
    PartialFailure,
}

impl ErrorKind {
    /// Rejections are detected before any storage call, so nothing was written.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::AlreadyExists | Self::InvalidInput | Self::ImmutableFieldViolation
        )
    }
}

impl GitreferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReferenceNotFound(_) | Self::FileNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateReference(_)
            | Self::StorageCollision { .. }
            | Self::DuplicateFile { .. } => ErrorKind::AlreadyExists,
            Self::InvalidDoi(_)
            | Self::DoiShapedId(_)
            | Self::UnsupportedStyle(_)
            | Self::UnsupportedAgency(_)
            | Self::EmptyFile(_)
            | Self::ValidationError(_)
            | Self::NoConvergence(_)
            | Self::ConfigError(_)
            | Self::TomlParse(_) => ErrorKind::InvalidInput,
            Self::ImmutableDoi { .. } | Self::ImmutableDoiFlag(_) => {
                ErrorKind::ImmutableFieldViolation
            }
            Self::Partial { .. } => ErrorKind::PartialFailure,
            Self::Storage(_)
            | Self::Unsaved(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::TomlSerialize(_) => ErrorKind::UpstreamFailure,
        }
    }

    pub(crate) fn partial(id: &str, step: &'static str, source: impl Into<GitreferError>) -> Self {
        Self::Partial {
            id: id.to_string(),
            step,
            source: Box::new(source.into()),
        }
    }
}

/// Exit codes used by the `gitrefer` binary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    NetworkError = 6,
    Conflict = 7,
    ConfirmRequired = 8,
}

impl From<ErrorKind> for ExitCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::AlreadyExists => Self::Conflict,
            ErrorKind::InvalidInput | ErrorKind::ImmutableFieldViolation => Self::InvalidArgs,
            ErrorKind::UpstreamFailure => Self::NetworkError,
            ErrorKind::PartialFailure => Self::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, GitreferError>;
