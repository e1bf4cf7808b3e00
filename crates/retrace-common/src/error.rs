use thiserror::Error;

/// Failures reported by a page-automation driver.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element {id} is stale (removed from DOM)")]
    ElementStale { id: u32 },

    #[error("Element {id} is not interactable: {reason}")]
    ElementNotInteractable { id: u32, reason: String },

    #[error("Invalid selector: {selector}")]
    SelectorInvalid { selector: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    ScriptError(String),

    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    // ============================================================
    // System Errors
    // ============================================================
    #[error("Not ready")]
    NotReady,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other: {0}")]
    Other(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

/// Errors raised while loading or validating a recorded document.
///
/// Any of these means the replay never starts.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read recorded document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse recorded document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported document version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Step at position {position} declares index {index}")]
    IndexMismatch { position: usize, index: usize },

    #[error("Step {index} ({action}) has no target element")]
    MissingElement { index: usize, action: &'static str },

    #[error("Step {index} has an invalid URL '{url}': {reason}")]
    InvalidUrl {
        index: usize,
        url: String,
        reason: String,
    },
}
