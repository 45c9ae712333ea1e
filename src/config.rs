//! Configuration handling for the wizard

use crate::catalog::StaticCatalog;
use crate::session::SessionOptions;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the catalog file
pub const CATALOG_ENV: &str = "VISA_WIZARD_CATALOG";

const DEFAULT_LOG_FILTER: &str = "visa_wizard=info";

/// User configuration for the wizard
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct WizardConfig {
    /// JSON catalog replacing the built-in jurisdictions and forms
    pub catalog_path: Option<PathBuf>,
    /// Refuse to finalize while fields are empty
    pub require_complete_forms: Option<bool>,
    /// tracing filter used when RUST_LOG is not set
    pub log_filter: Option<String>,
}

impl WizardConfig {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "visa-wizard", "visa-wizard")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from the platform config directory
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a file, falling back to defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the platform config directory, returning the file written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().context("no config directory on this platform")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Catalog file to use, with the environment taking precedence
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog_path_with(std::env::var_os(CATALOG_ENV).map(PathBuf::from))
    }

    fn catalog_path_with(&self, env_override: Option<PathBuf>) -> Option<PathBuf> {
        env_override.or_else(|| self.catalog_path.clone())
    }

    pub fn load_catalog(&self) -> Result<StaticCatalog> {
        load_catalog_at(self.catalog_path())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            require_complete_forms: self.require_complete_forms.unwrap_or(false),
        }
    }
}

fn load_catalog_at(path: Option<PathBuf>) -> Result<StaticCatalog> {
    match path {
        Some(path) => StaticCatalog::from_path(&path)
            .with_context(|| format!("loading catalog {}", path.display())),
        None => Ok(StaticCatalog::builtin()),
    }
}
