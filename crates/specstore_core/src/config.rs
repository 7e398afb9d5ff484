//! Runtime configuration for a specs store.
//!
//! # Responsibility
//! - Resolve the specs root and logging settings from defaults and env.
//!
//! # Invariants
//! - Environment values override defaults; callers (CLI flags) override env.
//! - The resolved log directory is always absolute.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Specs root used when nothing else is configured.
pub const DEFAULT_SPECS_ROOT: &str = "./specs";
pub const ENV_SPECS_ROOT: &str = "SPECSTORE_ROOT";
pub const ENV_LOG_LEVEL: &str = "SPECSTORE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SPECSTORE_LOG_DIR";

const DEFAULT_LOG_SUBDIR: &str = ".logs";

#[derive(Debug)]
pub enum ConfigError {
    EmptyValue(&'static str),
    CurrentDir(std::io::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue(name) => write!(f, "configuration value `{name}` cannot be empty"),
            Self::CurrentDir(err) => write!(f, "failed to resolve current directory: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CurrentDir(err) => Some(err),
            Self::EmptyValue(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub specs_root: PathBuf,
    pub log_level: String,
    /// Explicit log directory; `None` means `<specs_root>/.logs`.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            specs_root: PathBuf::from(DEFAULT_SPECS_ROOT),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            specs_root: root.into(),
            ..Self::default()
        }
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Blank values are
    /// treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();
        if let Some(root) = read(ENV_SPECS_ROOT) {
            config.specs_root = PathBuf::from(root.trim());
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level.trim().to_string();
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir.trim()));
        }
        config
    }

    /// Absolute directory for rolling log files.
    pub fn resolve_log_dir(&self) -> Result<PathBuf, ConfigError> {
        if self.specs_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyValue("specs_root"));
        }
        let dir = self
            .log_dir
            .clone()
            .unwrap_or_else(|| self.specs_root.join(DEFAULT_LOG_SUBDIR));
        if dir.is_absolute() {
            return Ok(dir);
        }
        let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        Ok(cwd.join(dir))
    }
}
