// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Reduced Python syntax tree.
//!
//! Only the shapes the extractor inspects are kept precisely: assignments,
//! names, string literals, attribute chains, calls with their keyword
//! arguments, and list displays. Everything else collapses into a few
//! opaque variants that still keep statement nesting intact.

use std::collections::VecDeque;

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `a = b = value`, one entry in `targets` per `=`.
    Assign { targets: Vec<Expr>, value: Expr },
    /// Any statement that owns nested blocks (`def`, `if`, `try`, ...).
    Compound(Vec<Suite>),
    /// Any other simple statement.
    Simple,
}

/// A block of statements nested inside a compound statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suite {
    /// Statements that are direct children of the compound statement.
    Direct(Vec<Stmt>),
    /// Statements held by an intermediate node, such as an `except` handler.
    Nested(Vec<Stmt>),
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(String),
    /// A `str` constant, after implicit concatenation.
    Str(String),
    /// Numbers, bytes, `None`, `True`, `False` and `...`.
    Constant,
    Attribute {
        value: Box<Self>,
        attr: String,
    },
    Subscript,
    Call {
        func: Box<Self>,
        keywords: Vec<Keyword>,
    },
    List(Vec<Self>),
    Tuple(Vec<Self>),
    Starred(Box<Self>),
    Other,
}

/// A keyword argument. `arg` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

impl Stmt {
    /// Returns the assigned value when this is `name = value` with a single
    /// plain-name target.
    pub fn single_assignment(&self, name: &str) -> Option<&Expr> {
        match self {
            Self::Assign { targets, value } => match targets.as_slice() {
                [Expr::Name(target)] if target == name => Some(value),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Expr {
    /// Returns the dotted path of a call target made only of names and
    /// attribute accesses, e.g. `["types", "Part", "from_text"]`.
    pub fn dotted_path(&self) -> Option<Vec<&str>> {
        match self {
            Self::Name(name) => Some(vec![name.as_str()]),
            Self::Attribute { value, attr } => {
                let mut path = value.dotted_path()?;
                path.push(attr);
                Some(path)
            }
            _ => None,
        }
    }

    /// Returns the value of keyword argument `name` when this is a call.
    ///
    /// Python rejects repeated keyword arguments at parse time, so the first
    /// match is the only one.
    pub fn keyword(&self, name: &str) -> Option<&Self> {
        let Self::Call { keywords, .. } = self else {
            return None;
        };
        keywords
            .iter()
            .find(|kw| kw.arg.as_deref() == Some(name))
            .map(|kw| &kw.value)
    }

    /// Returns `true` when this is a call whose target is exactly `path`.
    pub fn is_call_to(&self, path: &[&str]) -> bool {
        match self {
            Self::Call { func, .. } => func.dotted_path().is_some_and(|p| p == path),
            _ => false,
        }
    }
}

/// Breadth-first iterator over every statement in a module.
///
/// Visits statements in the order of Python's `ast.walk`: each nesting
/// level is exhausted before the next, and intermediate nodes such as
/// exception handlers count as a level of their own.
pub struct Walk<'a> {
    queue: VecDeque<Node<'a>>,
}

enum Node<'a> {
    Stmt(&'a Stmt),
    Level(&'a [Stmt]),
}

/// Walks `module` breadth-first.
pub fn walk(module: &[Stmt]) -> Walk<'_> {
    Walk {
        queue: module.iter().map(Node::Stmt).collect(),
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Stmt;

    fn next(&mut self) -> Option<&'a Stmt> {
        while let Some(node) = self.queue.pop_front() {
            match node {
                Node::Level(body) => self.queue.extend(body.iter().map(Node::Stmt)),
                Node::Stmt(stmt) => {
                    if let Stmt::Compound(suites) = stmt {
                        for suite in suites {
                            match suite {
                                Suite::Direct(body) => {
                                    self.queue.extend(body.iter().map(Node::Stmt));
                                }
                                Suite::Nested(body) => self.queue.push_back(Node::Level(body)),
                            }
                        }
                    }
                    return Some(stmt);
                }
            }
        }
        None
    }
}
