pub mod apa;
pub mod bibtex;
pub mod ris;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GitreferError, Result};
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStyle {
    #[default]
    Bibtex,
    Apa,
    Ris,
}

impl ExportStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bibtex => "bibtex",
            Self::Apa => "apa",
            Self::Ris => "ris",
        }
    }

    pub fn render(self, id: &str, record: &Record) -> String {
        match self {
            Self::Bibtex => bibtex::format_bibtex(id, record),
            Self::Apa => apa::format_apa(id, record),
            Self::Ris => ris::format_ris(id, record),
        }
    }
}

impl fmt::Display for ExportStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportStyle {
    type Err = GitreferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bibtex" => Ok(Self::Bibtex),
            "apa" => Ok(Self::Apa),
            "ris" => Ok(Self::Ris),
            _ => Err(GitreferError::UnsupportedStyle(s.to_string())),
        }
    }
}

/// Render `record` (stored under `id`) in the named style.
pub fn format(id: &str, record: &Record, style: &str) -> Result<String> {
    Ok(style.parse::<ExportStyle>()?.render(id, record))
}
