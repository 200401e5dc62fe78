// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Naming and writing of converted transcripts.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Base name for transcripts that have no input file to name them after.
pub const DEFAULT_CONVERSATION_NAME: &str = "gemini-conversation";

/// Builds a download-style file name, `<name>-<unix millis>.md`.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use gemini2md::export::{default_filename, DEFAULT_CONVERSATION_NAME};
///
/// let now = Utc.timestamp_millis_opt(1_735_689_600_123).unwrap();
/// assert_eq!(
///     default_filename(DEFAULT_CONVERSATION_NAME, now),
///     "gemini-conversation-1735689600123.md"
/// );
/// ```
#[must_use]
pub fn default_filename(name: &str, now: DateTime<Utc>) -> String {
    format!("{name}-{}.md", now.timestamp_millis())
}

/// Chooses where the transcript for `input` goes inside `out_dir`.
///
/// An input file maps to `<stem>.md`. Standard input, or a file without a
/// usable stem, gets a timestamped default name.
#[must_use]
pub fn output_path(input: Option<&Path>, out_dir: &Path, now: DateTime<Utc>) -> PathBuf {
    let file_name = input
        .and_then(Path::file_stem)
        .map_or_else(
            || default_filename(DEFAULT_CONVERSATION_NAME, now),
            |stem| format!("{}.md", stem.to_string_lossy()),
        );
    out_dir.join(file_name)
}

/// Writes `markdown` to `path` as UTF-8, creating parent directories.
///
/// # Errors
///
/// Returns any I/O error from creating the directories or the file.
pub fn save(path: &Path, markdown: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, markdown)
}
