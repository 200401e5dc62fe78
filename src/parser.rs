// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Message extraction from AI Studio "Get Code" Python exports.
//!
//! This module reads the Python SDK code that Google AI Studio generates for
//! a chat session and recovers the conversation it encodes. The code is
//! parsed, never executed.
//!
//! # Format Overview
//!
//! An export contains:
//! - A `contents = [...]` list of `types.Content(role=..., parts=[...])` calls
//! - Each part is a `types.Part.from_text(text="...")` call
//! - Optionally, a `generate_content_config = types.GenerateContentConfig(...)`
//!   call whose `system_instruction` keyword holds the system prompt
//!
//! Elements of any other shape (images, function calls, tools) are skipped
//! rather than rejected.
//!
//! # Example
//!
//! ```
//! use gemini2md::parser::{parse_export, Role};
//!
//! let code = r#"
//! contents = [
//!     types.Content(
//!         role="user",
//!         parts=[types.Part.from_text(text="Hello")],
//!     ),
//! ]
//! "#;
//!
//! let export = parse_export(code).unwrap();
//! assert_eq!(export.messages.len(), 1);
//! assert_eq!(export.messages[0].role, Role::User);
//! ```

use crate::ast::{self, Expr, Stmt};
use crate::placeholder::{has_content, is_placeholder};
use crate::syntax::{self, SyntaxError};
use log::debug;
use serde::Serialize;
use snafu::prelude::*;

const CONTENT_CALL: &[&str] = &["types", "Content"];
const PART_CALL: &[&str] = &["types", "Part", "from_text"];

/// Error type for extraction failures.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum ParseError {
    /// The source is not valid Python.
    #[snafu(display("Python syntax error: {source}"))]
    Syntax {
        /// The underlying syntax diagnostic.
        source: SyntaxError,
    },

    /// No `contents = ...` assignment exists anywhere in the source.
    #[snafu(display("No contents assignment found in code"))]
    NotFound,

    /// `contents` is assigned something other than a list display.
    #[snafu(display("contents is not a list"))]
    NotAList,
}

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A turn written by the person chatting.
    User,
    /// A turn produced by the model.
    Model,
}

impl Role {
    fn from_literal(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Self::User),
            "model" => Some(Self::Model),
            _ => None,
        }
    }
}

/// One conversation turn recovered from the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceMessage {
    /// Who produced this turn.
    pub role: Role,

    /// Text fragments in source order.
    ///
    /// Model turns usually carry two: the thinking, then the answer.
    pub parts: Vec<String>,
}

/// Everything extracted from one export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedExport {
    /// Conversation turns with at least one non-placeholder part.
    pub messages: Vec<SourceMessage>,

    /// The system prompt, if the export configures one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

/// Parses AI Studio Python export code into its conversation.
///
/// This is the main entry point for extraction.
///
/// # Arguments
///
/// * `source` - The raw Python code copied from AI Studio
///
/// # Errors
///
/// Returns an error if the code is not valid Python, has no `contents`
/// assignment, or assigns `contents` something other than a list.
///
/// # Example
///
/// ```
/// use gemini2md::parser::{parse_export, ParseError};
///
/// let err = parse_export("model = 'gemini-2.5-pro'").unwrap_err();
/// assert_eq!(err, ParseError::NotFound);
/// ```
pub fn parse_export(source: &str) -> Result<ParsedExport, ParseError> {
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    let module = syntax::parse_module(normalized.trim()).context(SyntaxSnafu)?;

    let contents = find_assignment(&module, "contents").context(NotFoundSnafu)?;
    let Expr::List(elements) = contents else {
        return NotAListSnafu.fail();
    };

    let messages: Vec<SourceMessage> = elements.iter().filter_map(extract_message).collect();
    debug!(
        "extracted {} of {} content elements",
        messages.len(),
        elements.len()
    );

    let system_instruction = find_assignment(&module, "generate_content_config")
        .and_then(extract_system_instruction)
        .filter(|text| !is_placeholder(text));

    Ok(ParsedExport {
        messages,
        system_instruction,
    })
}

/// Finds the first `name = value` assignment in walk order.
fn find_assignment<'a>(module: &'a [Stmt], name: &str) -> Option<&'a Expr> {
    ast::walk(module).find_map(|stmt| stmt.single_assignment(name))
}

/// Converts one `types.Content(...)` element into a message.
///
/// Returns `None` for elements of any other shape and for turns left with
/// no real text once placeholders are removed.
fn extract_message(element: &Expr) -> Option<SourceMessage> {
    if !element.is_call_to(CONTENT_CALL) {
        debug!("skipping contents element that is not a types.Content call");
        return None;
    }

    let role = match element.keyword("role") {
        Some(Expr::Str(role)) => Role::from_literal(role)?,
        _ => return None,
    };
    let Some(Expr::List(part_nodes)) = element.keyword("parts") else {
        return None;
    };

    let parts: Vec<String> = part_nodes
        .iter()
        .filter_map(part_text)
        .filter(|text| !is_placeholder(text))
        .map(str::to_owned)
        .collect();

    has_content(&parts).then_some(SourceMessage { role, parts })
}

/// Returns the text literal of a `types.Part.from_text(text="...")` call.
fn part_text(node: &Expr) -> Option<&str> {
    if !node.is_call_to(PART_CALL) {
        return None;
    }
    match node.keyword("text") {
        Some(Expr::Str(text)) => Some(text),
        _ => None,
    }
}

/// Reads the `system_instruction` keyword of the config call.
fn extract_system_instruction(config: &Expr) -> Option<String> {
    if !matches!(config, Expr::Call { .. }) {
        return None;
    }
    match config.keyword("system_instruction")? {
        Expr::Str(text) => Some(text.clone()),
        Expr::List(items) => part_text(items.first()?).map(str::to_owned),
        _ => None,
    }
}
