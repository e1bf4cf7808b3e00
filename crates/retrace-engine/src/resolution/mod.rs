pub mod resolver;
pub mod synthesis;
pub mod widening;

pub use resolver::{Resolution, evaluate, resolve, resolve_detailed};
pub use widening::MAX_WIDENING_CANDIDATES;

use crate::dom::DomTree;
use retrace_common::{ElementDescriptor, SelectorCandidate};

/// Parse `html` and resolve `descriptor` against it.
pub fn resolve_html(html: &str, descriptor: &ElementDescriptor) -> Vec<SelectorCandidate> {
    let tree = DomTree::parse(html);
    resolve(descriptor, &tree)
}
