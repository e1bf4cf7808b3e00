use retrace_engine::config::loader::{ConfigError, ConfigLoader};
use retrace_engine::config::schema::RetraceConfig;
use retrace_engine::replay::ReplayOptions;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_default_values() {
    let config = RetraceConfig::default();
    assert_eq!(config.replay.max_retries, 5);
    assert_eq!(config.replay.retry_delay_ms, 1000);
    assert_eq!(config.replay.settle_delay_ms, 1000);
    assert!(!config.browser.visible);
    assert_eq!(config.browser.command_timeout_ms, 10000);
    assert!(config.browser.chrome_bin.is_none());
    assert!(config.security.redact_in_logs);
}

#[tokio::test]
async fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
replay:
  max_retries: 3
  retry_delay_ms: 250
browser:
  visible: true
  chrome_bin: /opt/chromium/chrome
"#
    )
    .unwrap();

    let config = ConfigLoader::load_from(file.path())
        .await
        .expect("Failed to load config from file");

    assert_eq!(config.replay.max_retries, 3);
    assert_eq!(config.replay.retry_delay_ms, 250);
    // Unset values keep their defaults.
    assert_eq!(config.replay.settle_delay_ms, 1000);
    assert!(config.browser.visible);
    assert_eq!(
        config.browser.chrome_bin.as_deref(),
        Some(std::path::Path::new("/opt/chromium/chrome"))
    );
    assert!(config.security.redact_in_logs);
}

#[tokio::test]
async fn test_load_from_empty_file_uses_defaults() {
    let file = NamedTempFile::new().unwrap();
    let config = ConfigLoader::load_from(file.path()).await.unwrap();
    assert_eq!(config.replay.max_retries, 5);
}

#[tokio::test]
async fn test_load_from_nonexistent_file() {
    let result =
        ConfigLoader::load_from(std::path::Path::new("/nonexistent/path/config.yaml")).await;
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[tokio::test]
async fn test_load_from_invalid_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{{invalid yaml: [unclosed").unwrap();

    let result = ConfigLoader::load_from(file.path()).await;
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[tokio::test]
async fn test_load_with_type_mismatch() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
replay:
  max_retries: "several"
"#
    )
    .unwrap();

    let result = ConfigLoader::load_from(file.path()).await;
    assert!(result.is_err(), "Should fail on type mismatch");
}

#[tokio::test]
async fn test_zero_retries_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "replay:\n  max_retries: 0").unwrap();

    let result = ConfigLoader::load_from(file.path()).await;
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_options_from_config() {
    let mut config = RetraceConfig::default();
    config.replay.max_retries = 2;
    config.replay.retry_delay_ms = 50;
    config.replay.settle_delay_ms = 0;
    config.security.redact_in_logs = false;

    let options = ReplayOptions::from_config(&config);
    assert_eq!(options.max_retries, 2);
    assert_eq!(options.retry_delay, Duration::from_millis(50));
    assert_eq!(options.settle_delay, Duration::ZERO);
    assert!(!options.redact_in_logs);
    assert!(options.skippable_step_indexes.is_empty());
    assert!(!options.cancel.is_cancelled());
}
