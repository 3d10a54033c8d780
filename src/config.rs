//! Layered configuration.
//!
//! Values are merged with `figment`, later layers winning:
//!
//! 1. [`Config::default()`]
//! 2. A TOML file (`--config PATH`, or `config.toml` in the platform
//!    config directory)
//! 3. `DUPE_DETECTIVE_*` environment variables
//! 4. Command-line flags (applied by the caller)
//!
//! ```toml
//! workers = 8
//! verify_content = true
//! ignore_patterns = ["*.tmp", "node_modules/"]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::DeleteConfig;
use crate::duplicates::{default_workers, FinderConfig};
use crate::scanner::{WalkerConfig, DEFAULT_CHUNK_SIZE};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DUPE_DETECTIVE_";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested file does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong shape.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// Writing the file failed.
    #[error("failed to write configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Serializing to TOML failed.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hash workers; `0` means one per logical CPU.
    pub workers: usize,
    /// Hash job queue capacity; `0` means `workers * 4`.
    pub queue_capacity: usize,
    /// Read chunk size for hashing, in bytes.
    pub chunk_size: usize,
    /// Confirm hash matches byte-for-byte.
    pub verify_content: bool,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Skip empty files.
    pub skip_empty: bool,
    /// Gitignore-style patterns to exclude.
    pub ignore_patterns: Vec<String>,
    /// Move deleted files to the trash instead of removing them.
    pub trash: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_content: false,
            skip_hidden: false,
            skip_empty: false,
            ignore_patterns: Vec::new(),
            trash: false,
        }
    }
}

impl Config {
    /// `config.toml` in the platform configuration directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupe-detective").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Figment with every layer except CLI flags.
    ///
    /// A missing file contributes nothing.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration, falling back to defaults on any error.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        match Self::figment(path).extract() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit file, failing on any error.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotFound`] if the file is missing, or
    /// [`ConfigError::Invalid`] if any layer is malformed.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let config = Self::figment(Some(path)).extract().map_err(Box::new)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)
    }

    /// Effective worker count.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            default_workers()
        } else {
            self.workers
        }
    }

    /// Walker settings (size limits come from the command line).
    #[must_use]
    pub fn walker_config(&self, min_size: Option<u64>, max_size: Option<u64>) -> WalkerConfig {
        WalkerConfig::new(
            self.skip_hidden,
            min_size,
            max_size,
            self.ignore_patterns.clone(),
        )
        .with_skip_empty(self.skip_empty)
    }

    /// Scan settings.
    #[must_use]
    pub fn finder_config(&self, walker_config: WalkerConfig) -> FinderConfig {
        FinderConfig::default()
            .with_workers(self.effective_workers())
            .with_queue_capacity(self.queue_capacity)
            .with_chunk_size(self.chunk_size)
            .with_verify_content(self.verify_content)
            .with_walker_config(walker_config)
    }

    /// Deletion settings.
    #[must_use]
    pub fn delete_config(&self) -> DeleteConfig {
        DeleteConfig::default().with_trash(self.trash)
    }
}
