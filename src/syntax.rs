// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Recursive-descent parser for Python source.
//!
//! Covers the statement and expression grammar of ordinary Python modules,
//! which is a superset of what AI Studio's "Get Code" export emits. The
//! result is the reduced tree from [`crate::ast`]; semantics beyond shape
//! (name resolution, evaluation) are never attempted.
//!
//! A stock export uses imports, `def generate():`, keyword-argument calls,
//! attribute chains, list displays, triple-quoted strings, a `for` loop over
//! the stream and an `if __name__ == "__main__":` guard. Users edit exports
//! before pasting them, so the rest of the grammar is accepted too, and
//! anything Python would reject is reported as a [`SyntaxError`].
//!
//! Nesting is bounded: the lexer stops at 200 open brackets and 100
//! indented blocks, and the parser stops at [`MAX_NESTING`] nested
//! expressions, so hostile input fails instead of exhausting the stack.

use crate::ast::{Expr, Keyword, Stmt, Suite};
use crate::lexer::{self, StrKind, Token, TokenKind};
use std::fmt;

/// A Python syntax error with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    reason: String,
    line: usize,
    column: usize,
}

impl SyntaxError {
    pub(crate) fn new(reason: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            reason: reason.into(),
            line,
            column,
        }
    }

    /// The diagnostic without its location, e.g. `"invalid syntax"`.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// 1-based line of the offending token.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// 1-based column of the offending token.
    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.reason, self.line, self.column
        )
    }
}

impl std::error::Error for SyntaxError {}

type PResult<T> = Result<T, SyntaxError>;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

const AUGMENTED_ASSIGN: &[&str] = &[
    "+=", "-=", "*=", "/=", "//=", "%=", "@=", "&=", "|=", "^=", ">>=", "<<=", "**=",
];

/// Binary operator tiers from loosest to tightest, above unary operators.
const BINARY_LEVELS: &[&[&str]] = &[
    &["|"],
    &["^"],
    &["&"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "//", "%", "@"],
];

const COMPARISON_OPS: &[&str] = &["<", ">", "==", ">=", "<=", "!="];

/// Limit on nested expressions. Brackets count twice, once for the
/// display and once for the expression inside it.
const MAX_NESTING: usize = 200;

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Parses a complete module into its top-level statements.
pub fn parse_module(source: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let tokens = lexer::tokenize(source)?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .unwrap_or_else(|| &self.tokens[self.tokens.len() - 1])
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::EndMarker {
            self.pos += 1;
        }
        token
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek().kind, TokenKind::Op(o) if o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        let found = self.at_op(op);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_op(&mut self, op: &str) -> PResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{op}'")))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Name(n) if n == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.at_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{keyword}'")))
        }
    }

    fn error(&self, reason: impl Into<String>) -> SyntaxError {
        let token = self.peek();
        SyntaxError::new(reason, token.line, token.column)
    }

    /// Runs `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("too many nested expressions"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn invalid(&self) -> SyntaxError {
        match self.peek().kind {
            TokenKind::Indent => self.error("unexpected indent"),
            TokenKind::EndMarker => self.error("unexpected EOF while parsing"),
            _ => self.error("invalid syntax"),
        }
    }

    fn name(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Name(name) if !is_keyword(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.invalid()),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::EndMarker) || self.at_op(";")
    }

    /// Whether the current token can begin an expression.
    fn starts_expression(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Name(name) => {
                !is_keyword(name)
                    || matches!(
                        name.as_str(),
                        "True" | "False" | "None" | "not" | "lambda" | "await"
                    )
            }
            TokenKind::Number | TokenKind::Str(_) => true,
            TokenKind::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."),
            _ => false,
        }
    }

    // Statements

    fn module(mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.pos += 1;
                }
                _ => self.statement(&mut body)?,
            }
        }
        Ok(body)
    }

    fn statement(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        if self.peek().kind == TokenKind::Indent {
            return Err(self.error("unexpected indent"));
        }
        if self.at_op("@") {
            out.push(self.decorated()?);
            return Ok(());
        }
        let TokenKind::Name(keyword) = self.peek().kind.clone() else {
            return self.simple_statements(out);
        };

        let compound = match keyword.as_str() {
            "if" | "while" | "for" | "try" | "with" | "def" | "class" => true,
            "async" => matches!(
                &self.peek_at(1).kind,
                TokenKind::Name(n) if matches!(n.as_str(), "def" | "for" | "with")
            ),
            _ => false,
        };
        if compound {
            out.push(self.compound_statement()?);
            Ok(())
        } else {
            self.simple_statements(out)
        }
    }

    fn compound_statement(&mut self) -> PResult<Stmt> {
        self.eat_keyword("async");
        let TokenKind::Name(keyword) = self.advance().kind else {
            return Err(self.invalid());
        };
        match keyword.as_str() {
            "if" => self.if_rest(),
            "while" => self.while_rest(),
            "for" => self.for_rest(),
            "try" => self.try_rest(),
            "with" => self.with_rest(),
            "def" => self.def_rest(),
            "class" => self.class_rest(),
            _ => Err(self.invalid()),
        }
    }

    fn decorated(&mut self) -> PResult<Stmt> {
        while self.eat_op("@") {
            self.named_expression()?;
            if !matches!(self.advance().kind, TokenKind::Newline) {
                return Err(self.invalid());
            }
        }
        let target = matches!(
            &self.peek().kind,
            TokenKind::Name(n) if matches!(n.as_str(), "def" | "class" | "async")
        );
        if !target {
            return Err(self.invalid());
        }
        self.compound_statement()
    }

    /// Parses `':' block`.
    fn suite(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_op(":")?;
        let mut body = Vec::new();
        if self.peek().kind != TokenKind::Newline {
            self.simple_statements(&mut body)?;
            return Ok(body);
        }
        self.pos += 1;
        if self.peek().kind != TokenKind::Indent {
            return Err(self.error("expected an indented block"));
        }
        self.pos += 1;
        while !matches!(self.peek().kind, TokenKind::Dedent | TokenKind::EndMarker) {
            self.statement(&mut body)?;
        }
        if self.peek().kind == TokenKind::Dedent {
            self.pos += 1;
        }
        Ok(body)
    }

    fn if_rest(&mut self) -> PResult<Stmt> {
        self.named_expression()?;
        let mut suites = vec![Suite::Direct(self.suite()?)];
        if self.eat_keyword("elif") {
            suites.push(Suite::Direct(vec![self.if_rest()?]));
        } else if self.eat_keyword("else") {
            suites.push(Suite::Direct(self.suite()?));
        }
        Ok(Stmt::Compound(suites))
    }

    fn while_rest(&mut self) -> PResult<Stmt> {
        self.named_expression()?;
        let mut suites = vec![Suite::Direct(self.suite()?)];
        if self.eat_keyword("else") {
            suites.push(Suite::Direct(self.suite()?));
        }
        Ok(Stmt::Compound(suites))
    }

    fn for_rest(&mut self) -> PResult<Stmt> {
        self.target_list()?;
        self.expect_keyword("in")?;
        self.star_expressions()?;
        let mut suites = vec![Suite::Direct(self.suite()?)];
        if self.eat_keyword("else") {
            suites.push(Suite::Direct(self.suite()?));
        }
        Ok(Stmt::Compound(suites))
    }

    fn try_rest(&mut self) -> PResult<Stmt> {
        let mut suites = vec![Suite::Direct(self.suite()?)];
        let mut handled = false;
        while self.eat_keyword("except") {
            handled = true;
            self.eat_op("*");
            if !self.at_op(":") {
                self.expression()?;
                if self.eat_op(",") {
                    self.star_expressions()?;
                }
                if self.eat_keyword("as") {
                    self.name()?;
                }
            }
            suites.push(Suite::Nested(self.suite()?));
        }
        if handled && self.eat_keyword("else") {
            suites.push(Suite::Direct(self.suite()?));
        }
        if self.eat_keyword("finally") {
            handled = true;
            suites.push(Suite::Direct(self.suite()?));
        }
        if !handled {
            return Err(self.error("expected 'except' or 'finally' block"));
        }
        Ok(Stmt::Compound(suites))
    }

    fn with_rest(&mut self) -> PResult<Stmt> {
        let start = self.pos;
        let parenthesized = self.eat_op("(")
            && self.with_items(")").is_ok()
            && self.eat_op(")")
            && self.at_op(":");
        if !parenthesized {
            self.pos = start;
            self.with_items(":")?;
        }
        Ok(Stmt::Compound(vec![Suite::Direct(self.suite()?)]))
    }

    fn with_items(&mut self, close: &str) -> PResult<()> {
        loop {
            self.expression()?;
            if self.eat_keyword("as") {
                let target = self.star_target()?;
                check_target(&target).map_err(|reason| self.error(reason))?;
            }
            if !self.eat_op(",") || self.at_op(close) {
                return Ok(());
            }
        }
    }

    fn def_rest(&mut self) -> PResult<Stmt> {
        self.name()?;
        self.expect_op("(")?;
        self.parameters(")", true)?;
        if self.eat_op("->") {
            self.expression()?;
        }
        Ok(Stmt::Compound(vec![Suite::Direct(self.suite()?)]))
    }

    fn class_rest(&mut self) -> PResult<Stmt> {
        self.name()?;
        if self.eat_op("(") {
            self.arguments()?;
        }
        Ok(Stmt::Compound(vec![Suite::Direct(self.suite()?)]))
    }

    /// Parses a parameter list up to and including `close`.
    fn parameters(&mut self, close: &str, annotated: bool) -> PResult<()> {
        while !self.at_op(close) {
            if self.eat_op("/") {
                // positional-only marker
            } else if self.eat_op("**") || self.eat_op("*") {
                if matches!(self.peek().kind, TokenKind::Name(_)) {
                    self.name()?;
                    if annotated && self.eat_op(":") {
                        self.star_expression()?;
                    }
                }
            } else {
                self.name()?;
                if annotated && self.eat_op(":") {
                    self.expression()?;
                }
                if self.eat_op("=") {
                    self.expression()?;
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(close)
    }

    fn simple_statements(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        loop {
            out.push(self.small_statement()?);
            if !self.eat_op(";") || self.peek().kind == TokenKind::Newline {
                break;
            }
        }
        match self.peek().kind {
            TokenKind::Newline => {
                self.pos += 1;
                Ok(())
            }
            TokenKind::EndMarker => Ok(()),
            _ => Err(self.invalid()),
        }
    }

    fn small_statement(&mut self) -> PResult<Stmt> {
        let TokenKind::Name(keyword) = self.peek().kind.clone() else {
            return self.expression_statement();
        };
        match keyword.as_str() {
            "pass" | "break" | "continue" => {
                self.pos += 1;
            }
            "return" => {
                self.pos += 1;
                if !self.at_statement_end() {
                    self.star_expressions()?;
                }
            }
            "raise" => {
                self.pos += 1;
                if !self.at_statement_end() {
                    self.expression()?;
                    if self.eat_keyword("from") {
                        self.expression()?;
                    }
                }
            }
            "global" | "nonlocal" => {
                self.pos += 1;
                self.name()?;
                while self.eat_op(",") {
                    self.name()?;
                }
            }
            "del" => {
                self.pos += 1;
                let targets = self.target_list()?;
                check_target(&targets).map_err(|reason| self.error(reason))?;
            }
            "assert" => {
                self.pos += 1;
                self.expression()?;
                if self.eat_op(",") {
                    self.expression()?;
                }
            }
            "import" => {
                self.pos += 1;
                self.dotted_as_names()?;
            }
            "from" => {
                self.pos += 1;
                self.import_from_rest()?;
            }
            _ => return self.expression_statement(),
        }
        Ok(Stmt::Simple)
    }

    fn dotted_name(&mut self) -> PResult<()> {
        self.name()?;
        while self.eat_op(".") {
            self.name()?;
        }
        Ok(())
    }

    fn dotted_as_names(&mut self) -> PResult<()> {
        loop {
            self.dotted_name()?;
            if self.eat_keyword("as") {
                self.name()?;
            }
            if !self.eat_op(",") {
                return Ok(());
            }
        }
    }

    fn import_from_rest(&mut self) -> PResult<()> {
        let mut relative = false;
        while self.eat_op(".") || self.eat_op("...") {
            relative = true;
        }
        if !relative || !self.at_keyword("import") {
            self.dotted_name()?;
        }
        self.expect_keyword("import")?;
        if self.eat_op("*") {
            return Ok(());
        }
        let parenthesized = self.eat_op("(");
        loop {
            self.name()?;
            if self.eat_keyword("as") {
                self.name()?;
            }
            if !self.eat_op(",") || (parenthesized && self.at_op(")")) {
                break;
            }
        }
        if parenthesized {
            self.expect_op(")")?;
        }
        Ok(())
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let start = self.peek().clone();
        let target_error = |reason: &str| SyntaxError::new(reason, start.line, start.column);

        let first = self.assignment_value()?;

        if self.at_op("=") {
            let mut targets = vec![first];
            let value = loop {
                self.pos += 1;
                let next = self.assignment_value()?;
                if !self.at_op("=") {
                    break next;
                }
                targets.push(next);
            };
            for target in &targets {
                check_target(target).map_err(target_error)?;
            }
            return Ok(Stmt::Assign { targets, value });
        }

        if self.at_op(":") {
            if !matches!(first, Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript) {
                return Err(target_error(
                    "only single target (not tuple) can be annotated",
                ));
            }
            self.pos += 1;
            self.expression()?;
            if self.eat_op("=") {
                self.assignment_value()?;
            }
            return Ok(Stmt::Simple);
        }

        if let TokenKind::Op(op) = self.peek().kind
            && AUGMENTED_ASSIGN.contains(&op)
        {
            if !matches!(first, Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript) {
                return Err(target_error(
                    "illegal expression for augmented assignment",
                ));
            }
            self.pos += 1;
            self.assignment_value()?;
        }

        Ok(Stmt::Simple)
    }

    /// Parses the right-hand side of an assignment: a yield expression or a
    /// possibly-starred expression list.
    fn assignment_value(&mut self) -> PResult<Expr> {
        if self.at_keyword("yield") {
            self.yield_expression()
        } else {
            self.star_expressions()
        }
    }

    fn yield_expression(&mut self) -> PResult<Expr> {
        self.expect_keyword("yield")?;
        if self.eat_keyword("from") {
            self.expression()?;
        } else if self.starts_expression() {
            self.star_expressions()?;
        }
        Ok(Expr::Other)
    }

    /// Parses comma-separated targets for `for`, `del` and comprehensions.
    fn target_list(&mut self) -> PResult<Expr> {
        let first = self.star_target()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") && self.starts_expression() {
            items.push(self.star_target()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn star_target(&mut self) -> PResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.binary(0)?)));
        }
        self.binary(0)
    }

    // Expressions

    fn star_expressions(&mut self) -> PResult<Expr> {
        let first = self.star_expression()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") && self.starts_expression() {
            items.push(self.star_expression()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn star_expression(&mut self) -> PResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.binary(0)?)));
        }
        self.expression()
    }

    fn star_named_expression(&mut self) -> PResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.binary(0)?)));
        }
        self.named_expression()
    }

    fn named_expression(&mut self) -> PResult<Expr> {
        if matches!(self.peek().kind, TokenKind::Name(_))
            && matches!(self.peek_at(1).kind, TokenKind::Op(":="))
        {
            self.name()?;
            self.pos += 1;
            self.expression()?;
            return Ok(Expr::Other);
        }
        self.expression()
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> PResult<Expr> {
        if self.eat_keyword("lambda") {
            self.parameters(":", false)?;
            self.expression()?;
            return Ok(Expr::Other);
        }
        let body = self.disjunction()?;
        if self.eat_keyword("if") {
            self.disjunction()?;
            self.expect_keyword("else")?;
            self.expression()?;
            return Ok(Expr::Other);
        }
        Ok(body)
    }

    fn disjunction(&mut self) -> PResult<Expr> {
        let first = self.conjunction()?;
        if !self.at_keyword("or") {
            return Ok(first);
        }
        while self.eat_keyword("or") {
            self.conjunction()?;
        }
        Ok(Expr::Other)
    }

    fn conjunction(&mut self) -> PResult<Expr> {
        let first = self.inversion()?;
        if !self.at_keyword("and") {
            return Ok(first);
        }
        while self.eat_keyword("and") {
            self.inversion()?;
        }
        Ok(Expr::Other)
    }

    fn inversion(&mut self) -> PResult<Expr> {
        if self.eat_keyword("not") {
            self.nested(Self::inversion)?;
            return Ok(Expr::Other);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let first = self.binary(0)?;
        let mut compared = false;
        loop {
            let is_op = matches!(self.peek().kind, TokenKind::Op(op) if COMPARISON_OPS.contains(&op));
            if is_op || self.eat_keyword("in") {
                if is_op {
                    self.pos += 1;
                }
            } else if self.eat_keyword("is") {
                self.eat_keyword("not");
            } else if self.at_keyword("not")
                && matches!(&self.peek_at(1).kind, TokenKind::Name(n) if n == "in")
            {
                self.pos += 2;
            } else {
                break;
            }
            compared = true;
            self.binary(0)?;
        }
        Ok(if compared { Expr::Other } else { first })
    }

    /// Parses left-associative binary operators at `level` and tighter.
    fn binary(&mut self, level: usize) -> PResult<Expr> {
        let Some(ops) = BINARY_LEVELS.get(level) else {
            return self.factor();
        };
        let mut left = self.binary(level + 1)?;
        while matches!(self.peek().kind, TokenKind::Op(op) if ops.contains(&op)) {
            self.pos += 1;
            self.binary(level + 1)?;
            left = Expr::Other;
        }
        Ok(left)
    }

    fn factor(&mut self) -> PResult<Expr> {
        if self.eat_op("+") || self.eat_op("-") || self.eat_op("~") {
            self.nested(Self::factor)?;
            return Ok(Expr::Other);
        }
        self.power()
    }

    fn power(&mut self) -> PResult<Expr> {
        let awaited = self.eat_keyword("await");
        let base = self.primary()?;
        if self.eat_op("**") {
            self.nested(Self::factor)?;
            return Ok(Expr::Other);
        }
        Ok(if awaited { Expr::Other } else { base })
    }

    fn primary(&mut self) -> PResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op(".") {
                let attr = self.name()?;
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else if self.eat_op("(") {
                let keywords = self.arguments()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    keywords,
                };
            } else if self.eat_op("[") {
                self.slices()?;
                expr = Expr::Subscript;
            } else {
                return Ok(expr);
            }
        }
    }

    /// Parses call arguments after `(` up to and including `)`, returning the
    /// keyword arguments.
    fn arguments(&mut self) -> PResult<Vec<Keyword>> {
        let mut keywords: Vec<Keyword> = Vec::new();
        let mut keyword_unpacked = false;

        while !self.at_op(")") {
            if self.eat_op("**") {
                let value = self.expression()?;
                keywords.push(Keyword { arg: None, value });
                keyword_unpacked = true;
            } else if self.eat_op("*") {
                self.expression()?;
            } else if matches!(&self.peek().kind, TokenKind::Name(n) if !is_keyword(n))
                && matches!(self.peek_at(1).kind, TokenKind::Op("="))
            {
                let start = self.peek().clone();
                let arg = self.name()?;
                self.pos += 1;
                let value = self.expression()?;
                if keywords.iter().any(|kw| kw.arg.as_deref() == Some(&arg)) {
                    return Err(SyntaxError::new(
                        format!("keyword argument repeated: {arg}"),
                        start.line,
                        start.column,
                    ));
                }
                keywords.push(Keyword {
                    arg: Some(arg),
                    value,
                });
            } else {
                let start = self.peek().clone();
                self.named_expression()?;
                if self.at_keyword("for") || self.at_keyword("async") {
                    self.comprehension_clauses()?;
                }
                if self.at_op("=") {
                    return Err(self.error(
                        "expression cannot contain assignment, perhaps you meant \"==\"?",
                    ));
                }
                if keyword_unpacked {
                    return Err(SyntaxError::new(
                        "positional argument follows keyword argument unpacking",
                        start.line,
                        start.column,
                    ));
                }
                if keywords.iter().any(|kw| kw.arg.is_some()) {
                    return Err(SyntaxError::new(
                        "positional argument follows keyword argument",
                        start.line,
                        start.column,
                    ));
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok(keywords)
    }

    fn slices(&mut self) -> PResult<()> {
        while !self.at_op("]") {
            if !self.at_op(":") {
                self.star_named_expression()?;
            }
            if self.eat_op(":") {
                if !self.at_op(":") && !self.at_op("]") && !self.at_op(",") {
                    self.expression()?;
                }
                if self.eat_op(":") && !self.at_op("]") && !self.at_op(",") {
                    self.expression()?;
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op("]")
    }

    fn comprehension_clauses(&mut self) -> PResult<()> {
        loop {
            self.eat_keyword("async");
            if !self.eat_keyword("for") {
                return Ok(());
            }
            self.target_list()?;
            self.expect_keyword("in")?;
            self.disjunction()?;
            while self.eat_keyword("if") {
                self.disjunction()?;
            }
        }
    }

    fn atom(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Name(name) => match name.as_str() {
                "True" | "False" | "None" => {
                    self.pos += 1;
                    Ok(Expr::Constant)
                }
                _ if is_keyword(&name) => Err(self.invalid()),
                _ => {
                    self.pos += 1;
                    Ok(Expr::Name(name))
                }
            },
            TokenKind::Number => {
                self.pos += 1;
                Ok(Expr::Constant)
            }
            TokenKind::Str(_) => self.strings(),
            TokenKind::Op("...") => {
                self.pos += 1;
                Ok(Expr::Constant)
            }
            TokenKind::Op("(") => {
                self.pos += 1;
                self.nested(Self::parenthesized)
            }
            TokenKind::Op("[") => {
                self.pos += 1;
                self.nested(Self::list_display)
            }
            TokenKind::Op("{") => {
                self.pos += 1;
                self.nested(Self::brace_display)
            }
            _ => Err(self.invalid()),
        }
    }

    /// Joins adjacent string literals the way Python's implicit
    /// concatenation does.
    fn strings(&mut self) -> PResult<Expr> {
        let start = self.peek().clone();
        let mut text = String::new();
        let (mut bytes, mut other, mut formatted) = (false, false, false);

        while let TokenKind::Str(literal) = &self.peek().kind {
            match literal.kind {
                StrKind::Bytes => bytes = true,
                StrKind::Format => {
                    other = true;
                    formatted = true;
                }
                StrKind::Text => {
                    other = true;
                    text.push_str(&literal.value);
                }
            }
            self.pos += 1;
        }

        if bytes && other {
            return Err(SyntaxError::new(
                "cannot mix bytes and nonbytes literals",
                start.line,
                start.column,
            ));
        }
        Ok(if bytes {
            Expr::Constant
        } else if formatted {
            Expr::Other
        } else {
            Expr::Str(text)
        })
    }

    fn parenthesized(&mut self) -> PResult<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        if self.at_keyword("yield") {
            self.yield_expression()?;
            self.expect_op(")")?;
            return Ok(Expr::Other);
        }
        let first = self.star_named_expression()?;
        if self.at_keyword("for") || self.at_keyword("async") {
            self.comprehension_clauses()?;
            self.expect_op(")")?;
            return Ok(Expr::Other);
        }
        if !self.at_op(",") {
            self.expect_op(")")?;
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") && !self.at_op(")") {
            items.push(self.star_named_expression()?);
        }
        self.expect_op(")")?;
        Ok(Expr::Tuple(items))
    }

    fn list_display(&mut self) -> PResult<Expr> {
        let mut items = Vec::new();
        if self.eat_op("]") {
            return Ok(Expr::List(items));
        }
        items.push(self.star_named_expression()?);
        if self.at_keyword("for") || self.at_keyword("async") {
            self.comprehension_clauses()?;
            self.expect_op("]")?;
            return Ok(Expr::Other);
        }
        while self.eat_op(",") && !self.at_op("]") {
            items.push(self.star_named_expression()?);
        }
        self.expect_op("]")?;
        Ok(Expr::List(items))
    }

    fn brace_display(&mut self) -> PResult<Expr> {
        let mut first = true;
        while !self.at_op("}") {
            if self.eat_op("**") {
                self.binary(0)?;
            } else {
                self.star_named_expression()?;
                if self.eat_op(":") {
                    self.expression()?;
                }
            }
            if first && (self.at_keyword("for") || self.at_keyword("async")) {
                self.comprehension_clauses()?;
                break;
            }
            first = false;
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(Expr::Other)
    }
}

/// Checks that `expr` may appear on the left of `=`.
fn check_target(expr: &Expr) -> Result<(), &'static str> {
    match expr {
        Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript => Ok(()),
        Expr::Starred(inner) => check_target(inner),
        Expr::Tuple(items) | Expr::List(items) => items.iter().try_for_each(check_target),
        Expr::Str(_) | Expr::Constant => Err("cannot assign to literal"),
        Expr::Call { .. } => Err("cannot assign to function call"),
        Expr::Other => Err("cannot assign to expression"),
    }
}
