use async_trait::async_trait;
pub use retrace_common::error::DriverError;
use retrace_common::selector::SelectorKind;

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
    pub status: u16,
}

/// Opaque reference to a live element, valid until the page changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub id: u32,
}

/// What a selector matched on the live page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Found(ElementHandle),
    NotFound,
    Ambiguous(usize),
}

/// The page-automation interface the replay engine drives.
///
/// Every call is awaited on its own; implementations apply their own timeouts and
/// report them as [`DriverError::Timeout`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launch the driver (start a browser, connect to a remote, etc.)
    async fn launch(&mut self) -> Result<(), DriverError>;

    /// Close the driver and clean up resources.
    async fn close(&mut self) -> Result<(), DriverError>;

    /// Check if the driver is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Navigate to a specific URL.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError>;

    /// Serialized HTML of the live page.
    async fn content(&mut self) -> Result<String, DriverError>;

    /// Evaluate a selector on the live page, expecting exactly one match.
    async fn query_unique(
        &mut self,
        kind: SelectorKind,
        expression: &str,
    ) -> Result<QueryOutcome, DriverError>;

    async fn click(&mut self, element: ElementHandle) -> Result<(), DriverError>;

    /// Replace the value of an editable element with `text`.
    async fn fill(&mut self, element: ElementHandle, text: &str) -> Result<(), DriverError>;

    /// Choose the option labelled `label` in a `<select>` element.
    async fn select_option(
        &mut self,
        _element: ElementHandle,
        _label: &str,
    ) -> Result<(), DriverError> {
        Err(DriverError::NotSupported("select_option".into()))
    }

    /// Scroll the viewport vertically by `dy` pixels (negative scrolls up).
    async fn scroll_by(&mut self, _dy: i64) -> Result<(), DriverError> {
        Err(DriverError::NotSupported("scroll_by".into()))
    }

    /// Height of the viewport in pixels.
    async fn viewport_height(&mut self) -> Result<i64, DriverError> {
        Err(DriverError::NotSupported("viewport_height".into()))
    }
}
