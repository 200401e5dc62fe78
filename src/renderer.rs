// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown rendering for extracted conversations.
//!
//! This module transforms a list of [`SourceMessage`]s into a markdown
//! transcript ready to paste into another LLM.
//!
//! # Output Format
//!
//! Two dialects are supported:
//! - **Claude mode** opens with a short system preamble and labels turns
//!   `**Human:**` / `**Assistant:**`
//! - **Plain mode** uses `## User` / `## Assistant` headings
//!
//! Model turns with several parts treat the first as thinking and the last
//! as the answer. Thinking is only rendered when requested. A transcript
//! that ends on a model turn is closed with an end-of-conversation marker.
//!
//! # Example
//!
//! ```
//! use gemini2md::parser::{Role, SourceMessage};
//! use gemini2md::renderer::{render_markdown, ConversionOptions};
//!
//! let messages = vec![
//!     SourceMessage { role: Role::User, parts: vec!["Hello".into()] },
//!     SourceMessage { role: Role::Model, parts: vec!["Hi there".into()] },
//! ];
//!
//! let opts = ConversionOptions { claude_mode: false, ..Default::default() };
//! let rendered = render_markdown(&messages, &opts).unwrap();
//!
//! assert!(rendered.markdown.starts_with("## User\n\nHello"));
//! assert_eq!(rendered.message_count, 2);
//! ```

use crate::parser::{Role, SourceMessage};
use crate::placeholder::has_content;
use snafu::prelude::*;

const CLAUDE_PREAMBLE: &str = "**SYSTEM MESSAGE**\n\
    Your knowledge cutoff is January 2025.\n\n\
    ---\n\n\
    **Human:**\n\n";

const END_OF_CONVERSATION: &str = "---\n\n*End of conversation*\n\n";

/// Configuration options for markdown rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Whether to render the thinking part of multi-part model turns.
    pub include_thinking: bool,

    /// Whether to use the `Human:`/`Assistant:` dialect instead of headings.
    pub claude_mode: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            include_thinking: false,
            claude_mode: true,
        }
    }
}

/// Error type for rendering failures.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum RenderError {
    /// Every message was empty or a placeholder.
    #[snafu(display("No valid messages found to convert"))]
    EmptyResult,
}

/// A rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The markdown document, without leading or trailing whitespace.
    pub markdown: String,

    /// Number of messages that made it into the document.
    pub message_count: usize,
}

/// Renders a conversation as markdown.
///
/// This is the main entry point for rendering. Messages without any real
/// content are dropped first.
///
/// # Arguments
///
/// * `messages` - The conversation turns, in order
/// * `opts` - Configuration options controlling the output format
///
/// # Errors
///
/// Returns [`RenderError::EmptyResult`] when no message has real content.
pub fn render_markdown(
    messages: &[SourceMessage],
    opts: &ConversionOptions,
) -> Result<Rendered, RenderError> {
    let messages: Vec<&SourceMessage> = messages
        .iter()
        .filter(|message| has_content(&message.parts))
        .collect();
    ensure!(!messages.is_empty(), EmptyResultSnafu);

    let mut out = String::new();
    if opts.claude_mode {
        out.push_str(CLAUDE_PREAMBLE);
    }

    for (index, message) in messages.iter().enumerate() {
        match message.role {
            Role::User => render_user(&mut out, message, opts, index == 0),
            Role::Model => render_model(&mut out, message, opts),
        }
    }

    if messages.last().is_some_and(|m| m.role == Role::Model) {
        out.push_str(END_OF_CONVERSATION);
    }

    Ok(Rendered {
        markdown: out.trim().to_owned(),
        message_count: messages.len(),
    })
}

/// Renders a user turn. Only the first part is shown.
fn render_user(out: &mut String, message: &SourceMessage, opts: &ConversionOptions, first: bool) {
    if !opts.claude_mode {
        out.push_str("## User\n\n");
    } else if !first {
        // The preamble already opened the first Human turn.
        out.push_str("\n**Human:**\n\n");
    }

    if let Some(part) = message.parts.first() {
        push_paragraph(out, part);
    }
}

fn render_model(out: &mut String, message: &SourceMessage, opts: &ConversionOptions) {
    out.push_str(if opts.claude_mode {
        "**Assistant:**\n\n"
    } else {
        "## Assistant\n\n"
    });

    match message.parts.as_slice() {
        [] => {}
        [answer] => push_paragraph(out, answer),
        [thinking, .., response] => {
            let thinking = thinking.trim();
            if opts.include_thinking && !thinking.is_empty() {
                if opts.claude_mode {
                    out.push_str("<thinking>\n");
                    out.push_str(thinking);
                    out.push_str("\n</thinking>\n\n");
                } else {
                    out.push_str("### Thinking\n\n");
                    out.push_str(thinking);
                    out.push_str("\n\n### Response\n\n");
                }
            }
            push_paragraph(out, response);
        }
    }
}

/// Appends `text` trimmed and followed by a blank line, unless it is blank.
fn push_paragraph(out: &mut String, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        out.push_str(text);
        out.push_str("\n\n");
    }
}
