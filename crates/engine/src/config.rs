//! Configuration via `neostore.toml`
//!
//! A single config file next to the data. On first use a commented default
//! is written. To change settings, edit the file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use neostore_core::{Error, Result};

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "neostore.toml";

/// Container storage settings (`[storage]` section).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// File extension of container files, without the dot
    #[serde(default = "default_extension")]
    pub file_extension: String,
    /// fsync the container when it is closed
    #[serde(default = "default_true")]
    pub sync_on_close: bool,
    /// Accept containers that were never sealed
    #[serde(default)]
    pub allow_incomplete: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_extension: default_extension(),
            sync_on_close: true,
            allow_incomplete: false,
        }
    }
}

/// Loader settings (`[loader]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Follow references when loading and storing through a `DirLoader`
    #[serde(default)]
    pub recursive: bool,
}

fn default_extension() -> String {
    "neo5".to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration loaded from `neostore.toml`.
///
/// # Example
///
/// ```toml
/// [storage]
/// file_extension = "neo5"
/// sync_on_close = true
/// allow_incomplete = false
///
/// [loader]
/// recursive = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NeostoreConfig {
    /// Container storage settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Loader settings
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl NeostoreConfig {
    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file extension is empty or starts with a dot.
    pub fn validate(&self) -> Result<()> {
        let ext = &self.storage.file_extension;
        if ext.is_empty() || ext.starts_with('.') || ext.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "Invalid file_extension '{}' in {}. Expected a bare extension such as \"neo5\".",
                ext, CONFIG_FILE_NAME
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# neostore configuration

[storage]
# Extension of container files, without the dot (default: "neo5")
# Containers use the NEO5 record format, not HDF5
file_extension = "neo5"

# fsync each container when it is closed (default: true)
sync_on_close = true

# Load containers that were never sealed by a clean close (default: false)
# An unsealed container is usually the remains of an aborted write.
allow_incomplete = false

[loader]
# Follow references when loading and storing through a directory loader
recursive = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: NeostoreConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config in `dir`, or the defaults if there is none.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::InvalidConfig(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
