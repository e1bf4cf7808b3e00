use crate::config::RetraceConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Attempts per Click/InputText step, including the first.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Pause after every driver action.
    pub settle_delay: Duration,
    /// Step indexes treated as skippable on top of each step's own flag.
    pub skippable_step_indexes: BTreeSet<usize>,
    /// Overlaid on top of the document's own secrets.
    pub secrets: BTreeMap<String, String>,
    pub redact_in_logs: bool,
    /// Checked between steps.
    pub cancel: CancellationToken,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            settle_delay: Duration::from_secs(1),
            skippable_step_indexes: BTreeSet::new(),
            secrets: BTreeMap::new(),
            redact_in_logs: true,
            cancel: CancellationToken::new(),
        }
    }
}

impl ReplayOptions {
    pub fn from_config(config: &RetraceConfig) -> Self {
        Self {
            max_retries: config.replay.max_retries,
            retry_delay: Duration::from_millis(config.replay.retry_delay_ms),
            settle_delay: Duration::from_millis(config.replay.settle_delay_ms),
            redact_in_logs: config.security.redact_in_logs,
            ..Self::default()
        }
    }

    /// No delays at all; for tests and dry runs against static pages.
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn skip_step(mut self, index: usize) -> Self {
        self.skippable_step_indexes.insert(index);
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
