/// Configuration file loader for rs_tty_host
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File};
use tracing::{debug, info};

use crate::config::{ConfigError, HostConfig};

/// Prefix for environment overrides, e.g. `TTY_HOST_LISTEN_ADDR`
pub const ENV_PREFIX: &str = "TTY_HOST";

/// Configuration loader responsible for merging defaults, the TOML file and
/// environment variables into a [`HostConfig`]
pub struct ConfigLoader {
    env_prefix: String,
    environment: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a new configuration loader reading the process environment
    pub fn new() -> Self {
        Self {
            env_prefix: ENV_PREFIX.to_string(),
            environment: None,
        }
    }

    /// Read overrides from the given map instead of the process environment
    #[cfg(test)]
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Load configuration.
    ///
    /// An explicit path must exist; the default `config.toml` is optional.
    pub fn load_config(&self, config_path: Option<&Path>) -> Result<HostConfig, ConfigError> {
        let file_source = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.display().to_string()));
                }
                info!("Loading configuration from file: {:?}", path);
                File::from(path.to_path_buf()).required(true)
            }
            None => {
                let path = default_config_path();
                debug!("Using default configuration file path: {:?}", path);
                File::from(path).required(false)
            }
        };

        let environment = Environment::with_prefix(&self.env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("command")
            .with_list_parse_key("allowed_origins")
            .with_list_parse_key("environment")
            .source(self.environment.clone());

        let config: HostConfig = Config::builder()
            .add_source(file_source)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Default configuration path
pub fn default_config_path() -> PathBuf {
    // 使用当前工作目录作为默认配置文件目录
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.toml")
}
