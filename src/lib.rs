// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert Gemini AI Studio "Get Code" exports to Markdown.
//!
//! AI Studio exports a conversation as a Python script that rebuilds the
//! chat with the `google-genai` SDK. This crate reads that script without
//! running it and turns the conversation into a transcript that can be
//! pasted into another LLM.
//!
//! # Overview
//!
//! 1. The export is parsed as Python and the `contents = [...]` list is
//!    located, along with the optional system instruction
//! 2. Template placeholders such as `INSERT_INPUT_HERE` are dropped
//! 3. The remaining turns are rendered as Markdown in either the
//!    `Human:`/`Assistant:` dialect or with plain headings
//!
//! # Example
//!
//! ```
//! use gemini2md::renderer::ConversionOptions;
//!
//! let code = r#"
//! contents = [
//!     types.Content(role="user", parts=[types.Part.from_text(text="Hello")]),
//!     types.Content(role="model", parts=[types.Part.from_text(text="Hi there")]),
//! ]
//! "#;
//!
//! let opts = ConversionOptions { claude_mode: false, ..Default::default() };
//! let result = gemini2md::convert(code, &opts);
//!
//! assert!(result.success);
//! assert_eq!(result.message_count, Some(2));
//! assert!(result.markdown.unwrap().starts_with("## User"));
//! ```
//!
//! # Modules
//!
//! - [`parser`]: extraction of messages and the system instruction
//! - [`renderer`]: Markdown generation with configurable output options
//! - [`placeholder`]: detection of template placeholders
//! - [`engine`]: the extractor seam and its initialization lifecycle
//! - [`converter`]: end-to-end conversion and its result record
//! - [`export`]: output file naming and writing

#![deny(missing_docs)]

mod ast;
mod lexer;
mod syntax;

pub mod converter;
pub mod engine;
pub mod export;
pub mod parser;
pub mod placeholder;
pub mod renderer;

pub use syntax::SyntaxError;

use converter::{ConversionResult, Converter};
use renderer::ConversionOptions;

/// Converts an export in one call.
///
/// Uses a fresh engine backed by the built-in Python parser. Failures are
/// reported through [`ConversionResult::error`].
#[must_use]
pub fn convert(source: &str, opts: &ConversionOptions) -> ConversionResult {
    Converter::default().convert_to_result(source, opts)
}
