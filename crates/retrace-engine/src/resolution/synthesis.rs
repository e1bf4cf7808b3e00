//! Selector synthesis from a tag name and individual attributes.

use crate::dom::DomTree;
use crate::xpath::literal;
use retrace_common::ElementDescriptor;

/// Attributes tried after `id`, in this order.
pub const STABLE_ATTRIBUTES: [&str; 6] = [
    "name",
    "data-testid",
    "aria-label",
    "placeholder",
    "title",
    "type",
];

/// Tags never targeted by synthesized selectors.
const BANNED_TAGS: [&str; 1] = ["script"];

/// Longer visible texts are too volatile to be useful as identity.
const MAX_TEXT_LEN: usize = 80;

/// Synthesized XPaths for a recorded element, most preferred first.
pub fn for_descriptor(descriptor: &ElementDescriptor) -> Vec<String> {
    let Some(tag) = descriptor.tag_name.as_deref() else {
        return Vec::new();
    };
    synthesize(
        &tag.to_ascii_lowercase(),
        |name| descriptor.attributes.get(name).map(String::as_str),
        descriptor.text.as_deref(),
    )
}

/// Synthesized XPaths for a live element, most preferred first.
pub fn for_element(tree: &DomTree, index: usize) -> Vec<String> {
    let text = tree.text_content(index);
    synthesize(
        tree.tag(index),
        |name| tree.attribute(index, name),
        Some(text.as_str()),
    )
}

fn synthesize<'a>(
    tag: &str,
    attribute: impl Fn(&str) -> Option<&'a str>,
    text: Option<&str>,
) -> Vec<String> {
    let tag = tag.trim();
    if tag.is_empty() || BANNED_TAGS.contains(&tag) {
        return Vec::new();
    }

    let mut selectors = Vec::new();
    let present = |name: &str| attribute(name).filter(|v| !v.trim().is_empty());

    if let Some(id) = present("id") {
        selectors.push(format!("//{}[@id={}]", tag, literal(id)));
    }

    for name in STABLE_ATTRIBUTES {
        if let Some(value) = present(name) {
            selectors.push(format!("//{}[@{}={}]", tag, name, literal(value)));
        }
    }

    if let Some(class) = present("class") {
        for token in class.split_whitespace() {
            selectors.push(format!(
                "//{}[contains(concat(' ', normalize-space(@class), ' '), {})]",
                tag,
                literal(&format!(" {} ", token))
            ));
        }
    }

    if let Some(text) = text {
        let text = normalize(text);
        if !text.is_empty() && text.chars().count() <= MAX_TEXT_LEN {
            selectors.push(format!("//{}[normalize-space()={}]", tag, literal(&text)));
        }
    }

    selectors
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
