use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetraceConfig {
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Pause after every driver action to let the page settle.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_settle_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub visible: bool,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Overrides the `CHROME_BIN` environment variable.
    #[serde(default)]
    pub chrome_bin: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            visible: false,
            command_timeout_ms: default_command_timeout_ms(),
            chrome_bin: None,
        }
    }
}

fn default_command_timeout_ms() -> u64 {
    10000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_redact_in_logs")]
    pub redact_in_logs: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            redact_in_logs: default_redact_in_logs(),
        }
    }
}

fn default_redact_in_logs() -> bool {
    true
}
