//! Parsed live DOM snapshot.
//!
//! The page HTML handed over by the driver is parsed with `scraper` and flattened
//! into an arena of element nodes in document order, so that node indexes double as
//! document positions. Index 0 is the document node itself.
//!
//! `DomTree` keeps the `scraper::Html` around for CSS matching and is therefore not
//! `Send`; build it, query it and drop it without crossing an `.await`.

use crate::xpath::{XPath, XPathError};
use retrace_common::selector::SelectorKind;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use thiserror::Error;

/// Arena index of the document node.
pub const DOCUMENT: usize = 0;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    XPath(#[from] XPathError),

    #[error("Invalid CSS selector '{selector}': {reason}")]
    Css { selector: String, reason: String },
}

/// A child of a node, text and elements interleaved as in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Element(usize),
}

#[derive(Debug, Clone)]
pub struct DomNode {
    /// Lowercase tag name; empty for the document node.
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub parent: Option<usize>,
    /// Element children only.
    pub children: Vec<usize>,
    /// Text and element children in document order.
    pub content: Vec<Content>,
}

impl DomNode {
    fn document() -> Self {
        Self {
            tag: String::new(),
            attributes: Vec::new(),
            parent: None,
            children: Vec::new(),
            content: Vec::new(),
        }
    }

    /// Direct text node children, in order.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.content.iter().filter_map(|c| match c {
            Content::Text(text) => Some(text.as_str()),
            Content::Element(_) => None,
        })
    }
}

pub struct DomTree {
    html: Html,
    nodes: Vec<DomNode>,
}

impl DomTree {
    pub fn parse(content: &str) -> Self {
        let html = Html::parse_document(content);
        let nodes = flatten(&html);
        Self { html, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, index: usize) -> &DomNode {
        &self.nodes[index]
    }

    pub fn is_element(&self, index: usize) -> bool {
        index != DOCUMENT && index < self.nodes.len()
    }

    /// All element indexes in document order.
    pub fn elements(&self) -> impl Iterator<Item = usize> + '_ {
        1..self.nodes.len()
    }

    pub fn tag(&self, index: usize) -> &str {
        &self.nodes[index].tag
    }

    pub fn attribute(&self, index: usize, name: &str) -> Option<&str> {
        self.nodes[index]
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.nodes[index].children
    }

    /// Parent, grandparent and so on up to (and including) the document node.
    pub fn ancestors(&self, index: usize) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.nodes[index].parent,
        }
    }

    /// Every node below `index`, in document order.
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[index].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node].children.iter().rev());
        }
        out
    }

    /// String value of the node: every descendant text node, in document order.
    pub fn text_content(&self, index: usize) -> String {
        let mut text = String::new();
        self.collect_text(index, &mut text);
        text
    }

    fn collect_text(&self, index: usize, out: &mut String) {
        for content in &self.nodes[index].content {
            match content {
                Content::Text(text) => out.push_str(text),
                Content::Element(child) => self.collect_text(*child, out),
            }
        }
    }

    /// First non-blank direct text node, trimmed.
    pub fn own_text(&self, index: usize) -> Option<&str> {
        self.nodes[index]
            .texts()
            .map(str::trim)
            .find(|t| !t.is_empty())
    }

    /// Location step for `index` relative to its parent: `div`, or `div[2]` when the
    /// parent has more than one `div` child.
    pub fn position_segment(&self, index: usize) -> String {
        let tag = &self.nodes[index].tag;
        let Some(parent) = self.nodes[index].parent else {
            return tag.clone();
        };
        let same_tag: Vec<usize> = self.nodes[parent]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].tag == *tag)
            .collect();
        if same_tag.len() <= 1 {
            return tag.clone();
        }
        let position = same_tag.iter().position(|&c| c == index).unwrap_or(0) + 1;
        format!("{}[{}]", tag, position)
    }

    /// Positional steps from the root element down to `index`.
    pub fn path_segments(&self, index: usize) -> Vec<String> {
        let mut segments = vec![self.position_segment(index)];
        for ancestor in self.ancestors(index) {
            if ancestor == DOCUMENT {
                break;
            }
            segments.push(self.position_segment(ancestor));
        }
        segments.reverse();
        segments
    }

    pub fn absolute_xpath(&self, index: usize) -> String {
        format!("/{}", self.path_segments(index).join("/"))
    }

    /// Evaluate a selector and return matching element indexes in document order.
    pub fn query(&self, kind: SelectorKind, expression: &str) -> Result<Vec<usize>, QueryError> {
        match kind {
            SelectorKind::XPath => Ok(XPath::parse(expression)?.evaluate(self)),
            SelectorKind::Css => self.select_css(expression),
        }
    }

    fn select_css(&self, expression: &str) -> Result<Vec<usize>, QueryError> {
        let selector = Selector::parse(expression).map_err(|e| QueryError::Css {
            selector: expression.to_string(),
            reason: format!("{:?}", e),
        })?;

        // Arena indexes follow the same pre-order walk used by `flatten`.
        Ok(self
            .html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .enumerate()
            .filter(|(_, el)| selector.matches(el))
            .map(|(position, _)| position + 1)
            .collect())
    }
}

pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: Option<usize>,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.next?;
        self.next = self.tree.nodes[current].parent;
        Some(current)
    }
}

fn flatten(html: &Html) -> Vec<DomNode> {
    let mut nodes = vec![DomNode::document()];
    let mut index_of = HashMap::new();
    let root = html.tree.root();
    index_of.insert(root.id(), DOCUMENT);

    for node in root.descendants().skip(1) {
        let parent = node
            .parent()
            .and_then(|p| index_of.get(&p.id()).copied());

        match node.value() {
            Node::Element(el) => {
                let parent = parent.unwrap_or(DOCUMENT);
                let index = nodes.len();
                nodes.push(DomNode {
                    tag: el.name().to_ascii_lowercase(),
                    attributes: el
                        .attrs()
                        .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                        .collect(),
                    parent: Some(parent),
                    children: Vec::new(),
                    content: Vec::new(),
                });
                nodes[parent].children.push(index);
                nodes[parent].content.push(Content::Element(index));
                index_of.insert(node.id(), index);
            }
            Node::Text(text) => {
                if let Some(parent) = parent
                    && parent != DOCUMENT
                {
                    nodes[parent].content.push(Content::Text((**text).to_string()));
                }
            }
            _ => {}
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_keeps_document_order() {
        let tree = DomTree::parse(
            "<html><body><div id='a'><span>one</span></div><div id='b'>two</div></body></html>",
        );
        let tags: Vec<&str> = tree.elements().map(|i| tree.tag(i)).collect();
        assert_eq!(tags, vec!["html", "head", "body", "div", "span", "div"]);
        assert_eq!(tree.attribute(4, "id"), Some("a"));
        assert_eq!(tree.own_text(6), Some("two"));
        assert_eq!(tree.text_content(4), "one");
    }

    #[test]
    fn test_text_content_follows_document_order() {
        let tree = DomTree::parse("<p>Hello <b>world</b> again</p>");
        let p = tree.elements().find(|&i| tree.tag(i) == "p").unwrap();
        assert_eq!(tree.text_content(p), "Hello world again");
        assert_eq!(tree.own_text(p), Some("Hello"));
        let texts: Vec<&str> = tree.node(p).texts().collect();
        assert_eq!(texts, vec!["Hello ", " again"]);
    }

    #[test]
    fn test_absolute_xpath_uses_positions_only_when_needed() {
        let tree = DomTree::parse("<body><div><p>x</p></div><div><p>y</p><p>z</p></div></body>");
        let last_p = tree.elements().last().unwrap();
        assert_eq!(tree.absolute_xpath(last_p), "/html/body/div[2]/p[2]");
        let first_p = tree.elements().find(|&i| tree.tag(i) == "p").unwrap();
        assert_eq!(tree.absolute_xpath(first_p), "/html/body/div[1]/p");
    }

    #[test]
    fn test_css_indexes_match_arena() {
        let tree = DomTree::parse("<body><a class='x'>1</a><b><a class='x y'>2</a></b></body>");
        let hits = tree.query(SelectorKind::Css, "a.y").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(tree.own_text(hits[0]), Some("2"));
        assert!(tree.query(SelectorKind::Css, "a[").is_err());
    }
}
