//! Ranked selector resolution against a live DOM snapshot.

use super::synthesis;
use super::widening;
use crate::dom::DomTree;
use retrace_common::{ElementDescriptor, SelectorCandidate, SelectorKind, Specificity, Strategy};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Outcome of one resolution, with enough detail to explain it.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Unique candidates, most preferred first.
    pub candidates: Vec<SelectorCandidate>,
    /// Live element the widening search started from, if one was found.
    pub anchor: Option<usize>,
    /// Number of widening expressions evaluated.
    pub widening_considered: usize,
}

/// Resolve a recorded element against a live tree. An empty list means nothing
/// identifies the element uniquely.
pub fn resolve(descriptor: &ElementDescriptor, tree: &DomTree) -> Vec<SelectorCandidate> {
    resolve_detailed(descriptor, tree).candidates
}

pub fn resolve_detailed(descriptor: &ElementDescriptor, tree: &DomTree) -> Resolution {
    if !descriptor.has_identity() {
        debug!("Descriptor carries no identity, nothing to resolve");
        return Resolution::default();
    }

    let mut collector = Collector::new(tree);

    if let Some(xpath) = &descriptor.xpath {
        collector.consider(SelectorKind::XPath, xpath, Strategy::RecordedXpath, None);
    }

    // Elements matched ambiguously from here on are anchor candidates for widening.
    collector.collect_ambiguous = true;

    if let Some(css) = &descriptor.css_selector {
        collector.consider(SelectorKind::Css, css, Strategy::RecordedCss, None);
    }
    for xpath in &descriptor.alternative_xpaths {
        collector.consider(SelectorKind::XPath, xpath, Strategy::RecordedAlternative, None);
    }
    for xpath in synthesis::for_descriptor(descriptor) {
        collector.consider(SelectorKind::XPath, &xpath, Strategy::Synthesized, None);
    }
    collector.collect_ambiguous = false;

    if !collector.candidates.is_empty() {
        return collector.finish(None, 0);
    }

    let Some(anchor) = widening::pick_anchor(descriptor, tree, &collector.ambiguous) else {
        debug!(
            pool = collector.ambiguous.len(),
            "No single anchor among ambiguous matches, skipping widening"
        );
        return collector.finish(None, 0);
    };

    let considered = widening::widen(tree, anchor, &mut collector);
    collector.finish(Some(anchor), considered)
}

/// How many elements `expression` matches. Invalid expressions match nothing.
pub fn evaluate(tree: &DomTree, kind: SelectorKind, expression: &str) -> Specificity {
    Specificity::from_match_count(matches(tree, kind, expression).len())
}

pub(crate) fn matches(tree: &DomTree, kind: SelectorKind, expression: &str) -> Vec<usize> {
    match tree.query(kind, expression) {
        Ok(hits) => hits,
        Err(e) => {
            debug!(%kind, expression, error = %e, "Selector does not evaluate");
            Vec::new()
        }
    }
}

/// Evaluates candidate expressions once each and keeps the unique ones in order.
pub(crate) struct Collector<'t> {
    tree: &'t DomTree,
    seen: HashSet<(SelectorKind, String)>,
    pub(crate) candidates: Vec<SelectorCandidate>,
    pub(crate) ambiguous: BTreeSet<usize>,
    pub(crate) collect_ambiguous: bool,
}

impl<'t> Collector<'t> {
    fn new(tree: &'t DomTree) -> Self {
        Self {
            tree,
            seen: HashSet::new(),
            candidates: Vec::new(),
            ambiguous: BTreeSet::new(),
            collect_ambiguous: false,
        }
    }

    /// Evaluate `expression` unless it was already seen. Returns whether it was
    /// evaluated. With `expected`, a unique match only counts if it is that element.
    pub(crate) fn consider(
        &mut self,
        kind: SelectorKind,
        expression: &str,
        strategy: Strategy,
        expected: Option<usize>,
    ) -> bool {
        let expression = expression.trim();
        if expression.is_empty() || !self.seen.insert((kind, expression.to_string())) {
            return false;
        }

        let hits = matches(self.tree, kind, expression);
        let specificity = Specificity::from_match_count(hits.len());
        match specificity {
            Specificity::Unique if expected.is_none_or(|e| hits[0] == e) => {
                self.candidates.push(SelectorCandidate::new(
                    kind,
                    expression,
                    specificity,
                    strategy,
                ));
            }
            Specificity::Ambiguous if self.collect_ambiguous => {
                self.ambiguous.extend(hits);
            }
            _ => {}
        }
        true
    }

    fn finish(self, anchor: Option<usize>, widening_considered: usize) -> Resolution {
        debug!(
            candidates = self.candidates.len(),
            widening_considered, "Resolution finished"
        );
        Resolution {
            candidates: self.candidates,
            anchor,
            widening_considered,
        }
    }
}
