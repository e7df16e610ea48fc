//! Configuration for the loader and the CLI.
//!
//! The configuration is an explicit value handed to [`JsonStore`] and the
//! command handlers; nothing reads it from process-wide state. It is stored
//! in TOML format at `<store_data>/smm.toml` or, failing that, at
//! `~/.config/software-metrics/smm.toml` (or XDG equivalent).
//!
//! # Example Configuration
//!
//! ```toml
//! store_data = "/srv/metrics/octo-repo"
//! git_repository_location = "/src/octo-repo"
//! deployment_frequency_target_pipeline = ".github/workflows/deploy.yml"
//! deployment_frequency_target_job = "Deploy"
//! ```
//!
//! Resolution order: defaults, then the TOML file, then `SMM_*` environment
//! variables, then the `--data-dir` flag.
//!
//! [`JsonStore`]: crate::storage::JsonStore

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "smm.toml";
pub const ENV_STORE_DATA: &str = "SMM_STORE_DATA_AT";
pub const ENV_DEPLOYMENT_PIPELINE: &str = "SMM_DEPLOYMENT_PIPELINE";
pub const ENV_DEPLOYMENT_JOB: &str = "SMM_DEPLOYMENT_JOB";
pub const ENV_PAIRING_TRAILER: &str = "SMM_PAIRING_TRAILER";

const APP_DIR: &str = "software-metrics";
const DEFAULT_PAIRING_TRAILER: &str = "co-authored-by:";

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Directory holding `workflows.json`, `jobs.json` and `commits.json`.
    pub store_data: PathBuf,
    /// Path of the analysed repository, informational for reports.
    pub git_repository_location: Option<PathBuf>,
    /// Default `workflow_path` for deployment frequency and lead time.
    pub deployment_frequency_target_pipeline: Option<String>,
    /// Default `job_name` for deployment frequency and lead time.
    pub deployment_frequency_target_job: Option<String>,
    /// Commit message substring that marks a paired commit.
    pub pairing_trailer: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            store_data: default_store_dir(),
            git_repository_location: None,
            deployment_frequency_target_pipeline: None,
            deployment_frequency_target_job: None,
            pairing_trailer: DEFAULT_PAIRING_TRAILER.to_string(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_DIR)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(APP_DIR))
}

impl Configuration {
    /// Load configuration from a specific file.
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Resolve the full configuration for one invocation.
    ///
    /// `config_file` is `--config`; `data_dir` is `--data-dir`. Environment
    /// lookups go through the process environment.
    pub fn resolve(config_file: Option<&Path>, data_dir: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve_with(config_file, data_dir, |key| std::env::var(key).ok())
    }

    /// [`Configuration::resolve`] with an injectable environment.
    pub fn resolve_with<F>(
        config_file: Option<&Path>,
        data_dir: Option<&Path>,
        env: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_store = env(ENV_STORE_DATA).filter(|v| !v.trim().is_empty());

        let mut config = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Validation(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                Self::load_from(path)?
            }
            None => {
                let store_dir = data_dir
                    .map(Path::to_path_buf)
                    .or_else(|| env_store.as_deref().map(PathBuf::from))
                    .unwrap_or_else(default_store_dir);
                let local = store_dir.join(CONFIG_FILE_NAME);
                if local.exists() {
                    Self::load_from(&local)?
                } else {
                    match Self::config_path() {
                        Ok(global) => Self::load_from(&global)?,
                        Err(ConfigError::NoConfigDir) => Self::default(),
                        Err(e) => return Err(e),
                    }
                }
            }
        };

        config.apply_env(&env);
        if let Some(dir) = data_dir {
            config.store_data = dir.to_path_buf();
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay `SMM_*` environment variables; blank values are ignored.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = get(ENV_STORE_DATA) {
            self.store_data = PathBuf::from(dir);
        }
        if let Some(pipeline) = get(ENV_DEPLOYMENT_PIPELINE) {
            self.deployment_frequency_target_pipeline = Some(pipeline);
        }
        if let Some(job) = get(ENV_DEPLOYMENT_JOB) {
            self.deployment_frequency_target_job = Some(job);
        }
        if let Some(trailer) = get(ENV_PAIRING_TRAILER) {
            self.pairing_trailer = trailer;
        }
    }

    /// Get the default configuration file path.
    ///
    /// Uses XDG conventions:
    /// - Primary: `$XDG_CONFIG_HOME/software-metrics/smm.toml`
    /// - Fallback: platform-specific config dir
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR).join(CONFIG_FILE_NAME));
        }

        directories::ProjectDirs::from("", "", APP_DIR)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_data.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "store_data must not be empty".into(),
            ));
        }
        if self.pairing_trailer.trim().is_empty() {
            return Err(ConfigError::Validation(
                "pairing_trailer must not be empty".into(),
            ));
        }
        Ok(())
    }
}
