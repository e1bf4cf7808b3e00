pub mod config;
pub mod dom;
pub mod driver;
pub mod replay;
pub mod resolution;
pub mod xpath;

pub use retrace_common::formatter;
pub use retrace_common::result;
pub use retrace_common::schema;
pub use retrace_common::selector;

pub use dom::DomTree;
pub use driver::{Driver, DriverError, ElementHandle, NavigationResult, QueryOutcome};
pub use replay::{ReplayEngine, ReplayError, ReplayObserver, ReplayOptions, TracingObserver};
pub use resolution::{resolve, resolve_html};
