pub mod citekey;
pub mod config;
pub mod error;
pub mod formats;
pub mod identifiers;
pub mod models;
pub mod registry;
pub mod storage;
pub mod store;
pub mod text;

pub use config::{AppConfig, BackendKind};
pub use error::{ErrorKind, ExitCode, GitreferError, Result};
pub use models::*;

pub use citekey::{make_citekey, make_citekey_with};
pub use formats::{ExportStyle, format};
pub use identifiers::{Doi, validate_doi};
pub use registry::{Agency, RegistryMetadata, RegistryResponse};
pub use text::{simplify_title, transliterate};

pub use storage::{
    EntryKind, LocalStorage, MemoryStorage, StorageBackend, StorageEntry, StorageError,
    StorageResult, StoreLayout, StoredFile, sanitize_id,
};
pub use store::{Attachment, NewReference, ReferenceStore, StoreConfig, TagChange};
