// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! End-to-end conversion from exported source code to markdown.
//!
//! A [`Converter`] ties an [`Engine`] to the [`renderer`](crate::renderer).
//! Fallible callers use [`Converter::convert`]. Callers that want a flat,
//! serializable record use [`Converter::convert_to_result`].

use crate::engine::{
    Engine, EngineError, InitError, PythonExtractor, ReadyPolicy, TextStructureExtractor,
};
use crate::parser::ParseError;
use crate::renderer::{self, ConversionOptions, RenderError};
use log::debug;
use serde::Serialize;
use snafu::prelude::*;

/// Error type for a failed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum ConvertError {
    /// The source was empty or only whitespace.
    #[snafu(display("Please provide some Gemini SDK code to convert"))]
    EmptyInput,

    /// The engine was not ready and the converter does not wait.
    #[snafu(display("Parsing engine is not ready. Please wait for initialization to complete."))]
    EngineNotReady,

    /// The engine failed to initialize.
    #[snafu(display("{source}"))]
    EngineInit {
        /// The initialization failure.
        source: InitError,
    },

    /// The source could not be parsed.
    #[snafu(display("{source}"))]
    Parse {
        /// The extraction failure.
        source: ParseError,
    },

    /// Nothing was left to render.
    #[snafu(display("{source}"))]
    Render {
        /// The rendering failure.
        source: RenderError,
    },
}

impl From<EngineError> for ConvertError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotReady => Self::EngineNotReady,
            EngineError::Init { source } => Self::EngineInit { source },
            EngineError::Parse { source } => Self::Parse { source },
        }
    }
}

/// A successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// The rendered transcript.
    pub markdown: String,
    /// Number of messages in the transcript.
    pub message_count: usize,
    /// The system instruction found in the export, if any.
    pub system_instruction: Option<String>,
}

/// Flat outcome of a conversion, suitable for serialization.
///
/// Exactly one of `markdown` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Whether the conversion succeeded.
    pub success: bool,
    /// The rendered transcript on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    /// A human-readable message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of messages in the transcript on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    /// The system instruction found in the export, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
}

impl From<Result<Conversion, ConvertError>> for ConversionResult {
    fn from(result: Result<Conversion, ConvertError>) -> Self {
        match result {
            Ok(conversion) => Self {
                success: true,
                markdown: Some(conversion.markdown),
                error: None,
                message_count: Some(conversion.message_count),
                system_instruction: conversion.system_instruction,
            },
            Err(err) => Self {
                success: false,
                markdown: None,
                error: Some(err.to_string()),
                message_count: None,
                system_instruction: None,
            },
        }
    }
}

/// Converts exported source code with a given engine and readiness policy.
#[derive(Debug)]
pub struct Converter<E = PythonExtractor> {
    engine: Engine<E>,
    policy: ReadyPolicy,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Engine::default(), ReadyPolicy::Wait)
    }
}

impl<E: TextStructureExtractor> Converter<E> {
    /// Creates a converter around `engine`.
    pub const fn new(engine: Engine<E>, policy: ReadyPolicy) -> Self {
        Self { engine, policy }
    }

    /// The underlying engine, for lifecycle queries and explicit
    /// initialization.
    pub const fn engine(&self) -> &Engine<E> {
        &self.engine
    }

    /// Converts `source` to markdown.
    ///
    /// # Errors
    ///
    /// Fails on blank input, when the engine is not ready or cannot be
    /// initialized, when the source does not parse or has no `contents`
    /// list, and when no message has real content.
    pub fn convert(
        &self,
        source: &str,
        opts: &ConversionOptions,
    ) -> Result<Conversion, ConvertError> {
        ensure!(!source.trim().is_empty(), EmptyInputSnafu);

        let parsed = self.engine.extract(source, self.policy)?;
        debug!(
            "extracted {} messages, system instruction: {}",
            parsed.messages.len(),
            parsed.system_instruction.is_some()
        );

        let rendered = renderer::render_markdown(&parsed.messages, opts).context(RenderSnafu)?;
        Ok(Conversion {
            markdown: rendered.markdown,
            message_count: rendered.message_count,
            system_instruction: parsed.system_instruction,
        })
    }

    /// Converts `source` to markdown, folding any failure into the result.
    pub fn convert_to_result(&self, source: &str, opts: &ConversionOptions) -> ConversionResult {
        self.convert(source, opts).into()
    }
}
