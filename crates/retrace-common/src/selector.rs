use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    #[serde(rename = "xpath")]
    XPath,
    Css,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::XPath => write!(f, "xpath"),
            SelectorKind::Css => write!(f, "css"),
        }
    }
}

/// How many elements a selector matched in a given tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    NotFound,
    Ambiguous,
    Unique,
}

impl Specificity {
    pub fn from_match_count(count: usize) -> Self {
        match count {
            0 => Specificity::NotFound,
            1 => Specificity::Unique,
            _ => Specificity::Ambiguous,
        }
    }
}

/// Which resolution strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    RecordedXpath,
    RecordedCss,
    RecordedAlternative,
    Synthesized,
    /// Anchored on a uniquely identifiable child of the target.
    ChildAnchored,
    /// Anchored on an ancestor `depth` levels above the target.
    Widened { depth: usize },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RecordedXpath => write!(f, "recorded xpath"),
            Strategy::RecordedCss => write!(f, "recorded css"),
            Strategy::RecordedAlternative => write!(f, "recorded alternative"),
            Strategy::Synthesized => write!(f, "synthesized"),
            Strategy::ChildAnchored => write!(f, "child anchored"),
            Strategy::Widened { depth } => write!(f, "widened (depth {})", depth),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub kind: SelectorKind,
    pub expression: String,
    pub specificity: Specificity,
    #[serde(flatten)]
    pub strategy: Strategy,
}

impl SelectorCandidate {
    pub fn new(
        kind: SelectorKind,
        expression: impl Into<String>,
        specificity: Specificity,
        strategy: Strategy,
    ) -> Self {
        Self {
            kind,
            expression: expression.into(),
            specificity,
            strategy,
        }
    }

    pub fn is_unique(&self) -> bool {
        self.specificity == Specificity::Unique
    }
}

impl fmt::Display for SelectorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.expression)
    }
}
