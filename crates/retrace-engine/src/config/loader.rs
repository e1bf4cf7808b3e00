use super::schema::RetraceConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./retrace.yaml
    /// 2. ~/.retrace/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<RetraceConfig, ConfigError> {
        let local_config = PathBuf::from("./retrace.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".retrace").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(RetraceConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<RetraceConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(RetraceConfig::default());
        }
        let config: RetraceConfig = serde_yaml::from_str(&content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &RetraceConfig) -> Result<(), ConfigError> {
        if config.replay.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "replay.max_retries must be at least 1".into(),
            ));
        }
        if config.browser.command_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "browser.command_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
