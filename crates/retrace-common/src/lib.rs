pub mod error;
pub mod formatter;
pub mod result;
pub mod schema;
pub mod selector;

pub use error::{DocumentError, DriverError};
pub use result::{ReplayRun, RunStatus, StepResult};
pub use schema::{ElementDescriptor, RecordedStep, ReplayDocument, StepAction};
pub use selector::{SelectorCandidate, SelectorKind, Specificity, Strategy};
