//! Relative-path widening.
//!
//! When nothing recorded or synthesized is unique, the target is located among the
//! ambiguous matches and described relative to its surroundings instead: through a
//! uniquely identifiable child, or through the nearest ancestor that can be told
//! apart, followed by the positional path back down to the target.

use super::resolver::Collector;
use super::synthesis;
use crate::dom::{DOCUMENT, DomTree};
use retrace_common::{ElementDescriptor, SelectorKind, Strategy};
use std::collections::BTreeSet;

/// Hard bound on widening expressions evaluated per resolution.
pub const MAX_WIDENING_CANDIDATES: usize = 100;

/// The single element in `pool` that best agrees with the recording, or `None` when
/// the best score is shared.
pub(crate) fn pick_anchor(
    descriptor: &ElementDescriptor,
    tree: &DomTree,
    pool: &BTreeSet<usize>,
) -> Option<usize> {
    let recorded_path = descriptor
        .xpath
        .as_deref()
        .map(path_steps)
        .unwrap_or_default();

    let mut best: Option<((usize, usize), usize)> = None;
    let mut tied = false;

    for &element in pool {
        let live_path: Vec<String> = tree
            .path_segments(element)
            .iter()
            .map(|s| normalize_step(s))
            .collect();
        let score = (
            attribute_agreement(descriptor, tree, element),
            trailing_agreement(&recorded_path, &live_path),
        );
        match best {
            Some((top, _)) if score < top => {}
            Some((top, _)) if score == top => tied = true,
            _ => {
                best = Some((score, element));
                tied = false;
            }
        }
    }

    if tied { None } else { best.map(|(_, e)| e) }
}

fn attribute_agreement(descriptor: &ElementDescriptor, tree: &DomTree, element: usize) -> usize {
    let tag = descriptor
        .tag_name
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case(tree.tag(element)));
    let attributes = descriptor
        .attributes
        .iter()
        .filter(|(k, v)| tree.attribute(element, &k.to_ascii_lowercase()) == Some(v.as_str()))
        .count();
    attributes + usize::from(tag)
}

/// Number of trailing location steps the two paths have in common.
fn trailing_agreement(recorded: &[String], live: &[String]) -> usize {
    recorded
        .iter()
        .rev()
        .zip(live.iter().rev())
        .take_while(|(r, l)| r == l)
        .count()
}

/// Split an absolute XPath into comparable steps: lowercase, `[1]` dropped.
fn path_steps(xpath: &str) -> Vec<String> {
    xpath
        .split('/')
        .filter(|s| !s.is_empty())
        .map(normalize_step)
        .collect()
}

fn normalize_step(step: &str) -> String {
    let step = step.to_ascii_lowercase();
    match step.strip_suffix("[1]") {
        Some(bare) => bare.to_string(),
        None => step,
    }
}

/// Run the widening search from `anchor`, pushing unique candidates that select the
/// anchor. Returns the number of expressions evaluated.
pub(crate) fn widen(tree: &DomTree, anchor: usize, collector: &mut Collector<'_>) -> usize {
    let mut considered = 0;
    let mut consider = |collector: &mut Collector<'_>, expression: &str, strategy: Strategy| {
        if considered >= MAX_WIDENING_CANDIDATES {
            return false;
        }
        if collector.consider(SelectorKind::XPath, expression, strategy, Some(anchor)) {
            considered += 1;
        }
        true
    };

    // The anchor as it looks now, which may differ from the recording.
    for selector in synthesis::for_element(tree, anchor) {
        if !consider(collector, &selector, Strategy::Widened { depth: 0 }) {
            return MAX_WIDENING_CANDIDATES;
        }
    }

    let anchor_tag = tree.tag(anchor).to_string();
    for &child in tree.children(anchor) {
        for selector in synthesis::for_element(tree, child) {
            let expression = format!("{}/parent::{}", selector, anchor_tag);
            if !consider(collector, &expression, Strategy::ChildAnchored) {
                return MAX_WIDENING_CANDIDATES;
            }
        }
    }

    let mut suffix = vec![tree.position_segment(anchor)];
    for (level, ancestor) in tree.ancestors(anchor).enumerate() {
        if ancestor == DOCUMENT {
            break;
        }
        let depth = level + 1;
        let tail = suffix.join("/");

        let mut selectors = synthesis::for_element(tree, ancestor);
        selectors.push(format!("//{}", tree.tag(ancestor)));

        for selector in selectors {
            let expression = format!("{}/{}", selector, tail);
            if !consider(collector, &expression, Strategy::Widened { depth }) {
                return MAX_WIDENING_CANDIDATES;
            }
        }
        suffix.insert(0, tree.position_segment(ancestor));
    }

    considered
}
