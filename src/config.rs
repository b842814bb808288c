//! Configuration file support
//!
//! Reads `ism-collect.yaml` / `ism-collect.yml` / `ism-collect.json` from
//! the working directory, or an explicit file given on the command line.
//!
//! ```yaml
//! product_folder: 'D:\InstallShield\2022\'
//! redist_folder: 'D:\InstallShield\2022\Redist\Language Independent\i386'
//! reference_columns:
//!   - role: Stream
//!     table: ISSetupFile
//! ```

use crate::references::ColumnRule;
use crate::variables::{DEFAULT_PRODUCT_FOLDER, DEFAULT_REDIST_FOLDER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names looked up by [`Config::discover`], in order
pub const CONFIG_FILE_NAMES: &[&str] = &["ism-collect.yaml", "ism-collect.yml", "ism-collect.json"];

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config file: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Collector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Value for `ISProductFolder` when the project does not declare it
    pub product_folder: String,

    /// Value for `ISRedistPlatformDependentFolder` when the project does not declare it
    pub redist_folder: String,

    /// Extra reference-bearing columns, added to the built-in ones
    pub reference_columns: Vec<ColumnRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            product_folder: DEFAULT_PRODUCT_FOLDER.to_string(),
            redist_folder: DEFAULT_REDIST_FOLDER.to_string(),
            reference_columns: Vec::new(),
        }
    }
}

impl Config {
    /// Load from a YAML or JSON file, chosen by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => {
                let content = std::fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&content)?)
            }
            "json" => {
                let content = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&content)?)
            }
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// First config file found in `dir`, if any
    pub fn find(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the config file in `dir`, or defaults when there is none
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        match Self::find(dir) {
            Some(path) => {
                log::debug!("Using config {}", path.display());
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }
}
