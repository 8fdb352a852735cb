use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::citekey::DEFAULT_TITLE_WORDS;
use crate::error::{GitreferError, Result};
use crate::store::StoreConfig;

/// Root application configuration, loaded from `~/.config/gitrefer/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub registry: RegistryConfig,
    pub citekey: CitekeyConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Github,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// `owner/repo` of the GitHub repository holding the store.
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Name of the environment variable holding the access token.
    pub token_env: String,
    pub api_base: String,
    /// Store directory inside the repository or local folder.
    pub root: String,
    pub local_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub crossref_base: String,
    pub datacite_base: String,
    /// Sent as `mailto` in the User-Agent for the CrossRef polite pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polite_email: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitekeyConfig {
    pub title_words: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub download_pdf: bool,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("gitrefer");

        Self {
            backend: BackendKind::Github,
            repo: String::new(),
            branch: None,
            token_env: "GITREFER_TOKEN".to_string(),
            api_base: "https://api.github.com".to_string(),
            root: "references".to_string(),
            local_path: data_dir.to_string_lossy().to_string(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            crossref_base: "https://api.crossref.org".to_string(),
            datacite_base: "https://api.datacite.org".to_string(),
            polite_email: None,
            timeout_secs: 30,
        }
    }
}

impl Default for CitekeyConfig {
    fn default() -> Self {
        Self {
            title_words: DEFAULT_TITLE_WORDS,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { download_pdf: true }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/gitrefer/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("GITREFER_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("gitrefer")
            .join("config.toml")
    }

    /// Load config from the standard path and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific path, falling back to defaults if it
    /// doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// `GITREFER_REPO` and `GITREFER_ROOT` win over the file.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(repo) = lookup("GITREFER_REPO").filter(|v| !v.is_empty()) {
            self.storage.repo = repo;
        }
        if let Some(root) = lookup("GITREFER_ROOT").filter(|v| !v.is_empty()) {
            self.storage.root = root;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.citekey.title_words == 0 {
            return Err(GitreferError::ConfigError(
                "citekey.title_words must be at least 1".to_string(),
            ));
        }
        if self.storage.root.trim_matches('/').is_empty() {
            return Err(GitreferError::ConfigError("storage.root is empty".to_string()));
        }
        Ok(())
    }

    /// Access token from the variable named by `storage.token_env`.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.storage.token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            root: self.storage.root.clone(),
            title_words: self.citekey.title_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.storage.backend, BackendKind::Github);
        assert_eq!(cfg.storage.root, "references");
        assert_eq!(cfg.citekey.title_words, 1);
        assert!(cfg.import.download_pdf);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.storage.repo = "alice/papers".to_string();
        cfg.storage.branch = Some("main".to_string());
        cfg.registry.polite_email = Some("alice@example.org".to_string());
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nbackend = \"local\"\n\n[citekey]\ntitle_words = 2\n").unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.storage.backend, BackendKind::Local);
        assert_eq!(cfg.storage.token_env, "GITREFER_TOKEN");
        assert_eq!(cfg.store_config().title_words, 2);
        assert_eq!(cfg.registry.timeout_secs, 30);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = AppConfig::load_from(Path::new("/tmp/nonexistent_gitrefer_config.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path).unwrap_err(),
            GitreferError::TomlParse(_)
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|name| match name {
            "GITREFER_REPO" => Some("bob/refs".to_string()),
            "GITREFER_ROOT" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.storage.repo, "bob/refs");
        assert_eq!(cfg.storage.root, "references");
    }

    #[test]
    fn test_zero_title_words_rejected() {
        let mut cfg = AppConfig::default();
        cfg.citekey.title_words = 0;
        assert!(matches!(cfg.validate().unwrap_err(), GitreferError::ConfigError(_)));
    }
}
