//! XPath 1.0 subset evaluated against a [`DomTree`].
//!
//! Covers what recorders emit and what the resolver synthesizes: absolute, relative
//! and `//` location paths; the `child`, `parent`, `self`, `descendant`,
//! `descendant-or-self`, `ancestor`, `ancestor-or-self`, `following-sibling` and
//! `preceding-sibling` axes with their `.`, `..`, `*` abbreviations; predicates with
//! positions, `last()`, `and`/`or`/`not()`, `=`/`!=`, `contains`, `starts-with`,
//! `concat`, `normalize-space`, `text()` and `@attr`.
//!
//! Relative paths are evaluated from the document node, so `html/body/div[2]` and
//! `/html/body/div[2]` select the same element.

use crate::dom::{DOCUMENT, DomTree};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid XPath '{expression}' at {position}: {message}")]
pub struct XPathError {
    pub expression: String,
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Parent,
    SelfAxis,
    Descendant,
    DescendantOrSelf,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "parent" => Axis::Parent,
            "self" => Axis::SelfAxis,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    AnyElement,
    AnyNode,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
    Literal(String),
    Number(f64),
    Attribute(String),
    Text,
    Path(XPath),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Function {
    Position,
    Last,
    Not,
    Contains,
    StartsWith,
    NormalizeSpace,
    Concat,
    StringLength,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "position" => Function::Position,
            "last" => Function::Last,
            "not" => Function::Not,
            "contains" => Function::Contains,
            "starts-with" => Function::StartsWith,
            "normalize-space" => Function::NormalizeSpace,
            "concat" => Function::Concat,
            "string-length" => Function::StringLength,
            _ => return None,
        })
    }

    fn arity(&self) -> (usize, usize) {
        match self {
            Function::Position | Function::Last => (0, 0),
            Function::Not => (1, 1),
            Function::Contains | Function::StartsWith => (2, 2),
            Function::NormalizeSpace | Function::StringLength => (0, 1),
            Function::Concat => (2, usize::MAX),
        }
    }
}

// ============================================================
// Tokenizer
// ============================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Eq,
    Ne,
    Star,
    Dot,
    DotDot,
    ColonColon,
    Name(String),
    Literal(String),
    Number(f64),
}

fn tokenize(expression: &str) -> Result<Vec<(usize, Token)>, XPathError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let err = |position: usize, message: &str| XPathError {
        expression: expression.to_string(),
        position,
        message: message.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '@' => {
                i += 1;
                Token::At
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '=' => {
                i += 1;
                Token::Eq
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::Ne
            }
            '*' => {
                i += 1;
                Token::Star
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                i += 2;
                Token::ColonColon
            }
            '.' if chars.get(i + 1) == Some(&'.') => {
                i += 2;
                Token::DotDot
            }
            '.' if !chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) => {
                i += 1;
                Token::Dot
            }
            '\'' | '"' => {
                let quote = c;
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .ok_or_else(|| err(start, "unterminated string literal"))?;
                let literal: String = chars[i + 1..i + 1 + close].iter().collect();
                i += close + 2;
                Token::Literal(literal)
            }
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| err(start, "malformed number"))?;
                Token::Number(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len()
                    && (chars[i].is_alphanumeric()
                        || chars[i] == '_'
                        || chars[i] == '.'
                        || (chars[i] == '-'
                            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric())))
                {
                    i += 1;
                }
                Token::Name(chars[start..i].iter().collect())
            }
            other => return Err(err(start, &format!("unexpected character '{}'", other))),
        };
        tokens.push((start, token));
    }
    Ok(tokens)
}

// ============================================================
// Parser
// ============================================================

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> XPathError {
        let position = self
            .tokens
            .get(self.pos)
            .map(|(p, _)| *p)
            .unwrap_or(self.expression.len());
        XPathError {
            expression: self.expression.to_string(),
            position,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), XPathError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", expected)))
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == keyword)
    }

    fn parse_path(&mut self) -> Result<XPath, XPathError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.starts_step() {
                    // A lone "/" selects the document node.
                    return Ok(XPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(descendant_or_self_step());
                true
            }
            _ => false,
        };

        loop {
            steps.push(self.parse_step()?);
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(descendant_or_self_step());
                }
                _ => break,
            }
        }

        Ok(XPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_)) | Some(Token::Star) | Some(Token::Dot) | Some(Token::DotDot)
        )
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        match self.peek() {
            Some(Token::Dot) => {
                self.pos += 1;
                return Ok(Step {
                    axis: Axis::SelfAxis,
                    test: NodeTest::AnyNode,
                    predicates: Vec::new(),
                });
            }
            Some(Token::DotDot) => {
                self.pos += 1;
                return Ok(Step {
                    axis: Axis::Parent,
                    test: NodeTest::AnyNode,
                    predicates: Vec::new(),
                });
            }
            _ => {}
        }

        let mut axis = Axis::Child;
        if let Some(Token::Name(name)) = self.peek()
            && self.peek_at(1) == Some(&Token::ColonColon)
        {
            axis = Axis::from_name(name)
                .ok_or_else(|| self.error(format!("unsupported axis '{}'", name)))?;
            self.pos += 2;
        }

        let test = match self.advance() {
            Some(Token::Star) => NodeTest::AnyElement,
            Some(Token::Name(name)) if name == "node" && self.peek() == Some(&Token::LParen) => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                NodeTest::AnyNode
            }
            Some(Token::Name(name)) => NodeTest::Name(name.to_ascii_lowercase()),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.error("expected a node test"));
            }
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket)?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_comparison()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, XPathError> {
        let left = self.parse_primary()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.pos += 1;
                let right = self.parse_primary()?;
                Ok(Expr::Eq(Box::new(left), Box::new(right)))
            }
            Some(Token::Ne) => {
                self.pos += 1;
                let right = self.parse_primary()?;
                Ok(Expr::Ne(Box::new(left), Box::new(right)))
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        match self.peek().cloned() {
            Some(Token::Literal(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::At) => {
                self.pos += 1;
                match self.advance() {
                    Some(Token::Name(name)) => Ok(Expr::Attribute(name.to_ascii_lowercase())),
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        Err(self.error("expected attribute name after '@'"))
                    }
                }
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::LParen) && name != "node" =>
            {
                self.parse_call(&name)
            }
            Some(Token::Name(_))
            | Some(Token::Star)
            | Some(Token::Dot)
            | Some(Token::DotDot)
            | Some(Token::Slash)
            | Some(Token::DoubleSlash) => Ok(Expr::Path(self.parse_path()?)),
            _ => Err(self.error("expected an expression")),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, XPathError> {
        // name + '('
        self.pos += 2;

        if name == "text" {
            self.expect(Token::RParen)?;
            return Ok(Expr::Text);
        }

        let function = Function::from_name(name)
            .ok_or_else(|| self.error(format!("unsupported function '{}()'", name)))?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.parse_or()?);
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                args.push(self.parse_or()?);
            }
        }
        self.expect(Token::RParen)?;

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(self.error(format!(
                "{}() takes {} argument(s), got {}",
                name,
                if min == max {
                    min.to_string()
                } else {
                    format!("at least {}", min)
                },
                args.len()
            )));
        }
        Ok(Expr::Call(function, args))
    }
}

fn descendant_or_self_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::AnyNode,
        predicates: Vec::new(),
    }
}

// ============================================================
// Evaluation
// ============================================================

#[derive(Debug, Clone)]
enum Value {
    Bool(bool),
    Number(f64),
    Str(String),
    /// String values of a node-set.
    Nodes(Vec<String>),
}

impl Value {
    fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Nodes(n) => !n.is_empty(),
        }
    }

    fn to_string_value(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Nodes(n) => n.first().cloned().unwrap_or_default(),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => other.to_string_value().trim().parse().unwrap_or(f64::NAN),
        }
    }
}

fn compare(left: &Value, right: &Value, equal: bool) -> bool {
    let check = |a: bool| if equal { a } else { !a };
    match (left, right) {
        (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|a| r.iter().any(|b| check(a == b))),
        (Value::Nodes(n), other) | (other, Value::Nodes(n)) => match other {
            Value::Number(x) => n
                .iter()
                .any(|s| check(s.trim().parse::<f64>().is_ok_and(|v| v == *x))),
            Value::Bool(b) => check(!n.is_empty() == *b),
            _ => {
                let s = other.to_string_value();
                n.iter().any(|v| check(*v == s))
            }
        },
        (Value::Bool(_), _) | (_, Value::Bool(_)) => check(left.to_bool() == right.to_bool()),
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            check(left.to_number() == right.to_number())
        }
        _ => check(left.to_string_value() == right.to_string_value()),
    }
}

fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Context {
    node: usize,
    position: usize,
    size: usize,
}

impl XPath {
    pub fn parse(expression: &str) -> Result<Self, XPathError> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(XPathError {
                expression: expression.to_string(),
                position: 0,
                message: "empty expression".into(),
            });
        }
        let mut parser = Parser {
            expression,
            tokens,
            pos: 0,
        };
        let path = parser.parse_path()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(path)
    }

    /// Matching element indexes, deduplicated, in document order.
    pub fn evaluate(&self, tree: &DomTree) -> Vec<usize> {
        self.evaluate_from(tree, DOCUMENT)
            .into_iter()
            .filter(|&n| tree.is_element(n))
            .collect()
    }

    fn evaluate_from(&self, tree: &DomTree, context: usize) -> Vec<usize> {
        let mut current = vec![if self.absolute { DOCUMENT } else { context }];

        for step in &self.steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for &node in &current {
                for hit in step.apply(tree, node) {
                    if seen.insert(hit) {
                        next.push(hit);
                    }
                }
            }
            // Arena order is document order.
            next.sort_unstable();
            current = next;
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

impl Step {
    fn apply(&self, tree: &DomTree, node: usize) -> Vec<usize> {
        let mut candidates: Vec<usize> = axis_nodes(tree, node, self.axis)
            .into_iter()
            .filter(|&n| self.test.matches(tree, n))
            .collect();

        for predicate in &self.predicates {
            let size = candidates.len();
            candidates = candidates
                .into_iter()
                .enumerate()
                .filter(|&(i, n)| {
                    let ctx = Context {
                        node: n,
                        position: i + 1,
                        size,
                    };
                    match predicate.eval(tree, &ctx) {
                        Value::Number(p) => p == ctx.position as f64,
                        other => other.to_bool(),
                    }
                })
                .map(|(_, n)| n)
                .collect();
        }
        candidates
    }
}

impl NodeTest {
    fn matches(&self, tree: &DomTree, node: usize) -> bool {
        match self {
            NodeTest::AnyNode => true,
            NodeTest::AnyElement => tree.is_element(node),
            NodeTest::Name(name) => tree.is_element(node) && tree.tag(node) == name.as_str(),
        }
    }
}

/// Nodes on `axis` from `node`, nearest first.
fn axis_nodes(tree: &DomTree, node: usize, axis: Axis) -> Vec<usize> {
    match axis {
        Axis::Child => tree.children(node).to_vec(),
        Axis::Parent => tree.parent(node).into_iter().collect(),
        Axis::SelfAxis => vec![node],
        Axis::Descendant => tree.descendants(node),
        Axis::DescendantOrSelf => {
            let mut nodes = vec![node];
            nodes.extend(tree.descendants(node));
            nodes
        }
        Axis::Ancestor => tree.ancestors(node).collect(),
        Axis::AncestorOrSelf => std::iter::once(node).chain(tree.ancestors(node)).collect(),
        Axis::FollowingSibling | Axis::PrecedingSibling => {
            let Some(parent) = tree.parent(node) else {
                return Vec::new();
            };
            let siblings = tree.children(parent);
            let Some(at) = siblings.iter().position(|&s| s == node) else {
                return Vec::new();
            };
            if axis == Axis::FollowingSibling {
                siblings[at + 1..].to_vec()
            } else {
                siblings[..at].iter().rev().copied().collect()
            }
        }
    }
}

impl Expr {
    fn eval(&self, tree: &DomTree, ctx: &Context) -> Value {
        match self {
            Expr::Or(l, r) => {
                Value::Bool(l.eval(tree, ctx).to_bool() || r.eval(tree, ctx).to_bool())
            }
            Expr::And(l, r) => {
                Value::Bool(l.eval(tree, ctx).to_bool() && r.eval(tree, ctx).to_bool())
            }
            Expr::Eq(l, r) => Value::Bool(compare(&l.eval(tree, ctx), &r.eval(tree, ctx), true)),
            Expr::Ne(l, r) => Value::Bool(compare(&l.eval(tree, ctx), &r.eval(tree, ctx), false)),
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Number(n) => Value::Number(*n),
            Expr::Attribute(name) => Value::Nodes(
                tree.attribute(ctx.node, name)
                    .map(|v| vec![v.to_string()])
                    .unwrap_or_default(),
            ),
            Expr::Text => Value::Nodes(
                tree.node(ctx.node)
                    .texts()
                    .map(str::to_string)
                    .collect(),
            ),
            Expr::Path(path) => Value::Nodes(
                path.evaluate_from(tree, ctx.node)
                    .into_iter()
                    .map(|n| tree.text_content(n))
                    .collect(),
            ),
            Expr::Call(function, args) => eval_call(*function, args, tree, ctx),
        }
    }
}

fn eval_call(function: Function, args: &[Expr], tree: &DomTree, ctx: &Context) -> Value {
    let arg = |i: usize| args[i].eval(tree, ctx).to_string_value();
    match function {
        Function::Position => Value::Number(ctx.position as f64),
        Function::Last => Value::Number(ctx.size as f64),
        Function::Not => Value::Bool(!args[0].eval(tree, ctx).to_bool()),
        Function::Contains => Value::Bool(arg(0).contains(&arg(1))),
        Function::StartsWith => Value::Bool(arg(0).starts_with(&arg(1))),
        Function::NormalizeSpace => {
            let source = if args.is_empty() {
                tree.text_content(ctx.node)
            } else {
                arg(0)
            };
            Value::Str(normalize_space(&source))
        }
        Function::StringLength => {
            let source = if args.is_empty() {
                tree.text_content(ctx.node)
            } else {
                arg(0)
            };
            Value::Number(source.chars().count() as f64)
        }
        Function::Concat => Value::Str((0..args.len()).map(arg).collect()),
    }
}

/// Quote `value` as an XPath string literal, falling back to `concat()` when it
/// contains both quote characters.
pub fn literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
