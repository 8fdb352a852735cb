//! gitrefer remote collaborators: GitHub contents-API storage, CrossRef and
//! DataCite lookups, PDF download and PDF inspection.

pub mod error;
pub mod github;
pub mod http;
pub mod pdf;
pub mod registry;

pub use error::{RemoteError, Result};
pub use github::GitHubStorage;
pub use pdf::{PdfMetadata, inspect as inspect_pdf};
pub use registry::{RegistryClient, pdf_file_name};
