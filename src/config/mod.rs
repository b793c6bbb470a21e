//! Configuration management for ckpt
//!
//! Nothing here is process-global: the cache root and the loaded
//! [`Config`] travel together as a [`Context`] that every component
//! receives at construction.

pub mod schema;

pub use schema::{CheckpointConfig, Compression, Config, ExperimentConfig, ReportConfig};

use crate::error::{CkptError, CkptResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default cache root, relative to the working directory
pub const DEFAULT_ROOT: &str = ".ckpt";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager for the config file under `root`
    pub fn new(root: &Path) -> Self {
        Self {
            config_path: root.join("config"),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Load configuration, falling back to defaults if not exists
    pub fn load(&self) -> CkptResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            CkptError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )
        })?;

        serde_json::from_str(&content).map_err(|e| CkptError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> CkptResult<()> {
        if let Some(parent) = self.config_path.parent() {
            mkdirp(parent)?;
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, content).map_err(|e| {
            CkptError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Cache root plus its configuration
#[derive(Debug, Clone)]
pub struct Context {
    root: PathBuf,
    config: Config,
}

impl Context {
    /// Build a context from an explicit root and config
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Open a root, loading `<root>/config` if present
    pub fn open(root: impl Into<PathBuf>) -> CkptResult<Self> {
        let root = root.into();
        let config = ConfigManager::new(&root).load()?;
        Ok(Self { root, config })
    }

    /// Resolve the root from an optional override, else [`DEFAULT_ROOT`]
    pub fn discover(root: Option<PathBuf>) -> CkptResult<Self> {
        Self::open(root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Directory holding one subdirectory per checkpoint address
    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    /// Directory holding experiment records
    pub fn experiments_dir(&self) -> PathBuf {
        self.root.join("experiments")
    }
}

/// Same as `mkdir -p`
///
/// An already existing directory is fine; an existing non-directory at
/// `path` and every other failure propagate.
pub fn mkdirp(path: &Path) -> CkptResult<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(CkptError::io(
            format!("creating directory {}", path.display()),
            e,
        )),
    }
}
