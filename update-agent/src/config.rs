use config::{Config, Environment, File, FileFormat};
use duration_str::deserialize_option_duration;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::logging::LoggingConfig;

/// Environment variables starting with `UPDATE_AGENT_` override file values, using `__` to
/// separate nested keys. Eg: `UPDATE_AGENT_INSTALL__TIMEOUT=30m`.
pub const CONFIG_ENV_VAR_PREFIX: &str = "UPDATE_AGENT";

/// Longest wait for the terminal notification of an installation.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load config from `{0}`: {1}")]
    Load(String, String),
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct UpdateAgentConfig {
    #[serde(default)]
    pub log: LoggingConfig,
    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct InstallConfig {
    /// Bound of the wait for each artifact. `null` waits for as long as the installer needs.
    #[serde(
        default = "default_install_timeout",
        deserialize_with = "deserialize_option_duration"
    )]
    pub timeout: Option<Duration>,
    /// Module types this device installs. Empty accepts every type.
    #[serde(default)]
    pub module_types: Vec<String>,
}

fn default_install_timeout() -> Option<Duration> {
    Some(DEFAULT_INSTALL_TIMEOUT)
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            timeout: default_install_timeout(),
            module_types: Vec::new(),
        }
    }
}

impl InstallConfig {
    pub fn accepts_module_type(&self, module_type: &str) -> bool {
        self.module_types.is_empty() || self.module_types.iter().any(|t| t == module_type)
    }
}

impl UpdateAgentConfig {
    /// Loads the configuration from a YAML file, then applies the environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let location = path.to_string_lossy().to_string();
        Self::build(File::from(path).format(FileFormat::Yaml).required(true))
            .map_err(|err| ConfigError::Load(location, err.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Self::build(File::from_str(content, FileFormat::Yaml))
            .map_err(|err| ConfigError::Load("inline yaml".to_string(), err.to_string()))
    }

    fn build<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(source)
            .add_source(
                Environment::with_prefix(CONFIG_ENV_VAR_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Self>()
    }
}
