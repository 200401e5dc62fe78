// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Integration tests for gemini2md extraction and rendering.

use gemini2md::converter::{ConvertError, Converter};
use gemini2md::engine::{Engine, ReadyPolicy};
use gemini2md::parser::{self, ParseError, Role};
use gemini2md::renderer::{ConversionOptions, RenderError};
use gemini2md::{convert, export};
use std::fs;
use std::path::Path;

/// A complete export as produced by AI Studio's "Get Code" button.
const AI_STUDIO_EXPORT: &str = r#"# To run this code you need to install the following dependencies:
# pip install google-genai

import base64
import os
from google import genai
from google.genai import types


def generate():
    client = genai.Client(
        api_key=os.environ.get("GEMINI_API_KEY"),
    )

    model = "gemini-2.5-pro"
    contents = [
        types.Content(
            role="user",
            parts=[
                types.Part.from_text(text="""What is the borrow checker?"""),
            ],
        ),
        types.Content(
            role="model",
            parts=[
                types.Part.from_text(text="""**Defining the scope**

The user wants a short explanation of Rust's borrow checker."""),
                types.Part.from_text(text="""The borrow checker enforces Rust's ownership rules at compile time.

```rust
let s = String::from("hi");
let r = &s;
```"""),
            ],
        ),
        types.Content(
            role="user",
            parts=[
                types.Part.from_text(text="""Can it be turned off?"""),
            ],
        ),
        types.Content(
            role="model",
            parts=[
                types.Part.from_text(text="""No. `unsafe` relaxes some checks but borrows are still checked."""),
            ],
        ),
        types.Content(
            role="user",
            parts=[
                types.Part.from_text(text="""INSERT_INPUT_HERE"""),
            ],
        ),
    ]
    tools = [
        types.Tool(googleSearch=types.GoogleSearch(
        )),
    ]
    generate_content_config = types.GenerateContentConfig(
        thinking_config = types.ThinkingConfig(
            thinking_budget=-1,
        ),
        tools=tools,
        system_instruction=[
            types.Part.from_text(text="""You are a patient Rust tutor."""),
        ],
    )

    for chunk in client.models.generate_content_stream(
        model=model,
        contents=contents,
        config=generate_content_config,
    ):
        print(chunk.text, end="")

if __name__ == "__main__":
    generate()
"#;

fn claude(include_thinking: bool) -> ConversionOptions {
    ConversionOptions {
        include_thinking,
        claude_mode: true,
    }
}

fn plain(include_thinking: bool) -> ConversionOptions {
    ConversionOptions {
        include_thinking,
        claude_mode: false,
    }
}

/// Asserts that `needles` appear in `haystack` in the given order.
fn assert_in_order(haystack: &str, needles: &[&str]) {
    let mut offset = 0;
    for needle in needles {
        let found = haystack[offset..]
            .find(needle)
            .unwrap_or_else(|| panic!("{needle:?} not found in order in:\n{haystack}"));
        offset += found + needle.len();
    }
}

/// Converts every `.py` file in the exports directory and verifies the output.
#[test]
fn converts_all_sample_exports() {
    let exports_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("exports");

    if !exports_dir.exists() {
        // Skip if no sample exports directory
        return;
    }

    for entry in fs::read_dir(&exports_dir).expect("Failed to read exports directory") {
        let entry = entry.expect("Failed to read directory entry");
        let path = entry.path();

        if path.extension().is_some_and(|ext| ext == "py") {
            let source = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));

            let result = convert(&source, &ConversionOptions::default());
            assert!(
                result.success,
                "Failed to convert {}: {:?}",
                path.display(),
                result.error
            );

            let markdown = result.markdown.unwrap_or_default();
            assert!(
                markdown.starts_with("**SYSTEM MESSAGE**"),
                "Invalid markdown header in {}",
                path.display()
            );
        }
    }
}

#[test]
fn converts_full_export_in_claude_mode() {
    let result = convert(AI_STUDIO_EXPORT, &claude(false));

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.message_count, Some(4));
    assert_eq!(
        result.system_instruction.as_deref(),
        Some("You are a patient Rust tutor.")
    );

    let markdown = result.markdown.unwrap();
    assert_in_order(
        &markdown,
        &[
            "**SYSTEM MESSAGE**",
            "**Human:**",
            "What is the borrow checker?",
            "**Assistant:**",
            "The borrow checker enforces",
            "```rust\nlet s = String::from(\"hi\");",
            "**Human:**",
            "Can it be turned off?",
            "**Assistant:**",
            "No. `unsafe` relaxes",
            "---\n\n*End of conversation*",
        ],
    );
    assert!(!markdown.contains("Defining the scope"));
    assert!(!markdown.contains("INSERT_INPUT_HERE"));
    assert!(!markdown.contains("patient Rust tutor"));
}

#[test]
fn includes_thinking_when_requested() {
    let markdown = convert(AI_STUDIO_EXPORT, &claude(true)).markdown.unwrap();
    assert!(markdown.contains(
        "<thinking>\n**Defining the scope**\n\nThe user wants a short explanation of Rust's borrow checker.\n</thinking>"
    ));

    let markdown = convert(AI_STUDIO_EXPORT, &plain(true)).markdown.unwrap();
    assert_in_order(
        &markdown,
        &["## Assistant", "### Thinking", "Defining the scope", "### Response", "The borrow checker"],
    );
}

#[test]
fn plain_mode_uses_headings() {
    let markdown = convert(AI_STUDIO_EXPORT, &plain(false)).markdown.unwrap();

    assert!(markdown.starts_with("## User\n\nWhat is the borrow checker?"));
    assert_eq!(markdown.matches("## User").count(), 2);
    assert_eq!(markdown.matches("## Assistant").count(), 2);
    assert!(!markdown.contains("SYSTEM MESSAGE"));
    assert!(markdown.ends_with("*End of conversation*"));
}

#[test]
fn simple_round_trip_in_both_dialects() {
    let code = r#"contents = [
    types.Content(role="user", parts=[types.Part.from_text(text="Hello")]),
    types.Content(role="model", parts=[types.Part.from_text(text="Hi there")]),
]"#;

    let claude_output = convert(code, &claude(false)).markdown.unwrap();
    assert_in_order(
        &claude_output,
        &[
            "**SYSTEM MESSAGE**\nYour knowledge cutoff is January 2025.",
            "**Human:**",
            "Hello",
            "**Assistant:**",
            "Hi there",
            "*End of conversation*",
        ],
    );

    let plain_output = convert(code, &plain(false)).markdown.unwrap();
    assert_eq!(
        plain_output,
        "## User\n\nHello\n\n## Assistant\n\nHi there\n\n---\n\n*End of conversation*"
    );
}

#[test]
fn parsing_is_idempotent() {
    let first = parser::parse_export(AI_STUDIO_EXPORT).unwrap();
    let second = parser::parse_export(AI_STUDIO_EXPORT).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.messages.iter().map(|m| m.role).collect::<Vec<_>>(),
        vec![Role::User, Role::Model, Role::User, Role::Model]
    );
}

#[test]
fn windows_line_endings_convert_the_same() {
    let crlf = AI_STUDIO_EXPORT.replace('\n', "\r\n");

    assert_eq!(
        convert(&crlf, &claude(true)),
        convert(AI_STUDIO_EXPORT, &claude(true))
    );
}

#[test]
fn placeholder_is_never_rendered() {
    for placeholder in ["INSERT_INPUT_HERE", "insert_input_here", "  Insert_Input_Here\n"] {
        let code = format!(
            r#"contents = [
    types.Content(role="user", parts=[types.Part.from_text(text="Hi")]),
    types.Content(role="user", parts=[types.Part.from_text(text="""{placeholder}""")]),
]"#
        );
        let result = convert(&code, &claude(false));

        assert_eq!(result.message_count, Some(1));
        let markdown = result.markdown.unwrap();
        assert!(!markdown.to_uppercase().contains("INSERT_INPUT_HERE"));
    }
}

#[test]
fn skips_malformed_elements() {
    let code = r#"contents = [
    types.Content(role="user", parts=[types.Part.from_text(text="kept")]),
    types.Content(role="system", parts=[types.Part.from_text(text="wrong role")]),
    types.Content(role="model", parts=types.Part.from_text(text="not a list")),
    types.Content(role="model", parts=[types.Part.from_uri(file_uri="gs://x", mime_type="image/png")]),
    {"role": "model", "parts": ["a dict"]},
    types.Content(role="model", parts=[types.Part.from_text(text="also kept")]),
]"#;

    let parsed = parser::parse_export(code).unwrap();
    assert_eq!(parsed.messages.len(), 2);

    let markdown = convert(code, &plain(false)).markdown.unwrap();
    assert!(markdown.contains("kept"));
    assert!(markdown.contains("also kept"));
    assert!(!markdown.contains("wrong role"));
    assert!(!markdown.contains("a dict"));
}

#[test]
fn all_placeholders_is_an_empty_result() {
    let code = r#"contents = [
    types.Content(role="user", parts=[types.Part.from_text(text="INSERT_INPUT_HERE")]),
]"#;

    let err = Converter::default()
        .convert(code, &claude(false))
        .unwrap_err();
    assert_eq!(
        err,
        ConvertError::Render {
            source: RenderError::EmptyResult
        }
    );
    assert_eq!(
        convert(code, &claude(false)).error.as_deref(),
        Some("No valid messages found to convert")
    );
}

#[test]
fn missing_contents_is_not_found() {
    let code = "from google import genai\nmodel = 'gemini-2.5-flash'\n";

    assert_eq!(parser::parse_export(code).unwrap_err(), ParseError::NotFound);
    assert_eq!(
        convert(code, &claude(false)).error.as_deref(),
        Some("No contents assignment found in code")
    );
}

#[test]
fn invalid_python_reports_syntax_error() {
    let result = convert("def generate(:\n    pass\n", &claude(false));

    assert!(!result.success);
    assert!(result.markdown.is_none());
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Python syntax error: "))
    );
}

#[test]
fn empty_source_asks_for_code() {
    let result = convert("   \n", &claude(false));

    assert_eq!(
        result.error.as_deref(),
        Some("Please provide some Gemini SDK code to convert")
    );
}

#[test]
fn shared_converter_initializes_once_across_threads() {
    let converter = Converter::new(Engine::default(), ReadyPolicy::Wait);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let conversion = converter.convert(AI_STUDIO_EXPORT, &claude(false)).unwrap();
                assert_eq!(conversion.message_count, 4);
            });
        }
    });

    assert!(converter.engine().is_ready());
}

#[test]
fn writes_transcript_next_to_default_name() {
    let dir = tempfile::tempdir().unwrap();
    let conversion = Converter::default()
        .convert(AI_STUDIO_EXPORT, &plain(false))
        .unwrap();

    let path = export::output_path(
        Some(Path::new("chats/borrow-checker.py")),
        dir.path(),
        chrono::Utc::now(),
    );
    export::save(&path, &conversion.markdown).unwrap();

    assert_eq!(path.file_name().unwrap(), "borrow-checker.md");
    assert_eq!(fs::read_to_string(&path).unwrap(), conversion.markdown);

    let stdin_path = export::output_path(None, dir.path(), chrono::Utc::now());
    let name = stdin_path.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("gemini-conversation-"));
    assert!(name.ends_with(".md"));
}
