pub mod entry_type;
pub mod record;
pub mod timestamp;

pub use entry_type::EntryType;
pub use record::{Author, ManualFields, REQUIRED_KEYS, Record, missing_key, validate};
