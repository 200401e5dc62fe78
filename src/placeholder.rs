// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Detection of template placeholders left in exported prompts.
//!
//! AI Studio fills empty prompt slots with markers such as
//! `INSERT_INPUT_HERE`. These carry no conversation content and are dropped
//! both when extracting messages and again before rendering.

use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)INSERT_[A-Z_]+_HERE").unwrap());

const KNOWN_PLACEHOLDERS: [&str; 3] = [
    "INSERT_INPUT_HERE",
    "INSERT_YOUR_PROMPT_HERE",
    "INSERT_USER_INPUT_HERE",
];

/// Returns `true` if `text` is a placeholder rather than real content.
///
/// Blank text counts as a placeholder, as does any text containing an
/// `INSERT_..._HERE` marker in any letter case.
///
/// # Example
///
/// ```
/// use gemini2md::placeholder::is_placeholder;
///
/// assert!(is_placeholder("  insert_input_here \n"));
/// assert!(is_placeholder("   "));
/// assert!(!is_placeholder("What is Rust?"));
/// ```
#[must_use]
pub fn is_placeholder(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || PLACEHOLDER_RE.is_match(text) {
        return true;
    }
    KNOWN_PLACEHOLDERS.contains(&trimmed.to_uppercase().as_str())
}

/// Returns `true` if at least one of `parts` is real content.
#[must_use]
pub fn has_content<S: AsRef<str>>(parts: &[S]) -> bool {
    parts.iter().any(|part| !is_placeholder(part.as_ref()))
}
