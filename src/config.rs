use crate::error::{ReconError, Result};
use crate::matcher::MatchOptions;
use catalog_recon_common::{KeywordTable, DEFAULT_MIN_TOKEN_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "CATALOG_RECON_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum score accepted by the token-subset tier
    pub token_subset_threshold: f64,
    /// Minimum score accepted by the keyword-category tier
    pub keyword_threshold: f64,
    /// Tokens of this length or shorter are ignored
    pub min_token_len: usize,
    /// Scan image directories recursively
    pub recursive: bool,
    /// `createdBy` values that mark a record as machine-generated
    pub auto_generated_tags: Vec<String>,
    /// Regex for image references that count as "no image"
    pub placeholder_pattern: Option<String>,
    /// JSON keyword table replacing the built-in one
    pub keyword_table: Option<PathBuf>,
    /// Directory image references are relative to
    pub asset_root: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    /// Prepended to the asset-root-relative path of a newly matched image
    pub ref_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        let matching = MatchOptions::default();
        Self {
            token_subset_threshold: matching.token_subset_threshold,
            keyword_threshold: matching.keyword_threshold,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            recursive: false,
            auto_generated_tags: vec![
                "importer-bot".into(),
                "auto-generated".into(),
                "bulk-import".into(),
                "mock-generator".into(),
            ],
            placeholder_pattern: None,
            keyword_table: None,
            asset_root: None,
            backup_dir: None,
            report_dir: None,
            ref_prefix: "/".into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| ReconError::Config("home directory not found".into()))?;
        Ok(home.join(".config").join("catalog-recon").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("token_subset_threshold", self.token_subset_threshold),
            ("keyword_threshold", self.keyword_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReconError::Config(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, value
                )));
            }
        }
        if let Some(pattern) = &self.placeholder_pattern {
            regex::Regex::new(pattern)?;
        }
        Ok(())
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            token_subset_threshold: self.token_subset_threshold,
            keyword_threshold: self.keyword_threshold,
            min_token_len: self.min_token_len,
        }
    }

    /// Keyword table: explicit path first, then the configured file, then
    /// the built-in table.
    pub fn keyword_table(&self, override_path: Option<&Path>) -> Result<KeywordTable> {
        match override_path.or(self.keyword_table.as_deref()) {
            Some(path) => {
                if !path.exists() {
                    return Err(ReconError::FileNotFound(path.display().to_string()));
                }
                Ok(KeywordTable::from_file(path)?)
            }
            None => Ok(KeywordTable::builtin()),
        }
    }
}
