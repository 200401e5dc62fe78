// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Command-line interface for gemini2md.
//!
//! This binary provides the `gemini2md` command for converting Gemini AI
//! Studio Python exports to Markdown transcripts.

use chrono::Utc;
use gemini2md::converter::{Conversion, ConversionResult, ConvertError, Converter};
use gemini2md::export;
use gemini2md::renderer::ConversionOptions;
use lexopt::prelude::*;
use snafu::{ensure, prelude::*};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where to write the rendered output.
#[derive(Clone)]
enum OutputTarget {
    /// Write each transcript to the specified directory.
    Directory(PathBuf),
    /// Write to stdout.
    Stdout,
}

/// One export to convert.
#[derive(Clone)]
enum Input {
    File(PathBuf),
    Stdin,
}

impl Input {
    fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Stdin => None,
        }
    }

    fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => "<stdin>".to_owned(),
        }
    }
}

#[allow(clippy::struct_excessive_bools)]
struct Cli {
    input: Vec<Input>,
    output: OutputTarget,
    include_thinking: bool,
    claude_mode: bool,
    json: bool,
    show_system: bool,
    quiet: bool,
    dry_run: bool,
    force: bool,
    verbose: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to parse arguments: {source}"))]
    ParseArgs { source: lexopt::Error },

    #[snafu(display("at least one input file, directory, or - is required"))]
    NoInputFiles,

    #[snafu(display("cannot write multiple transcripts to stdout without --json"))]
    MultipleInputsToStdout,

    #[snafu(display("failed to create output directory: {source}"))]
    CreateOutputDir { source: std::io::Error },

    #[snafu(display("failed to read {name}: {source}"))]
    ReadInput {
        name: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to convert {name}: {source}"))]
    ConvertInput { name: String, source: ConvertError },

    #[snafu(display("{count} of {total} conversions failed"))]
    ConversionsFailed { count: usize, total: usize },

    #[snafu(display("failed to serialize result: {source}"))]
    SerializeResult { source: serde_json::Error },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn print_help() {
    println!(
        "\
{name} {version}
Convert Gemini AI Studio code exports to Markdown

Usage: {name} [OPTIONS] <INPUT>...

Arguments:
  <INPUT>...  Exported .py files, directories containing exports, or - for stdin

Options:
  -o, --output <OUTPUT>     Output directory, or - for stdout (default: stdout)
      --json                Print each conversion result as a JSON line

Transcript format:
      --claude              Use Human:/Assistant: labels (default: on)
      --plain               Use ## User / ## Assistant headings
      --thinking            Include thinking blocks (default: off)
      --no-thinking         Omit thinking blocks
      --show-system         Print the system instruction to stderr

Other options:
  -q, --quiet               Suppress progress messages
  -n, --dry-run             Show what would be processed without writing
  -f, --force               Overwrite existing output files
  -v, --verbose             Enable debug logging (RUST_LOG overrides)
  -h, --help                Print help
  -V, --version             Print version",
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn parse_args() -> Result<Cli, lexopt::Error> {
    // Show help if no arguments provided
    if std::env::args().len() == 1 {
        print_help();
        std::process::exit(0);
    }

    let mut input = Vec::new();
    let mut output = OutputTarget::Stdout;
    let defaults = ConversionOptions::default();
    let mut include_thinking = defaults.include_thinking;
    let mut claude_mode = defaults.claude_mode;
    let mut json = false;
    let mut show_system = false;
    let mut quiet = false;
    let mut dry_run = false;
    let mut force = false;
    let mut verbose = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => {
                let val: PathBuf = parser.value()?.parse()?;
                output = if val == Path::new("-") {
                    OutputTarget::Stdout
                } else {
                    OutputTarget::Directory(val)
                };
            }
            // Paired flags - last one wins
            Long("thinking") => include_thinking = true,
            Long("no-thinking") => include_thinking = false,
            Long("claude") => claude_mode = true,
            Long("plain") => claude_mode = false,
            Long("json") => json = true,
            Long("show-system") => show_system = true,
            Short('q') | Long("quiet") => quiet = true,
            Short('n') | Long("dry-run") => dry_run = true,
            Short('f') | Long("force") => force = true,
            Short('v') | Long("verbose") => verbose = true,
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            Short('V') | Long("version") => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            Value(val) if val == "-" => input.push(Input::Stdin),
            Value(val) => input.push(Input::File(val.parse()?)),
            _ => return Err(arg.unexpected()),
        }
    }

    Ok(Cli {
        input,
        output,
        include_thinking,
        claude_mode,
        json,
        show_system,
        quiet,
        dry_run,
        force,
        verbose,
    })
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<(), Error> {
    let cli = parse_args().context(ParseArgsSnafu)?;
    init_logging(cli.verbose);

    ensure!(!cli.input.is_empty(), NoInputFilesSnafu);

    // Collect all inputs first
    let inputs = collect_inputs(&cli.input);
    let converter = Converter::default();

    if cli.json {
        return process_json(&inputs, &converter, &cli);
    }

    match &cli.output {
        OutputTarget::Stdout => {
            ensure!(inputs.len() <= 1, MultipleInputsToStdoutSnafu);
            if let Some(input) = inputs.first() {
                process_to_stdout(input, &converter, &cli)?;
            }
        }
        OutputTarget::Directory(dir) => {
            if !cli.dry_run {
                std::fs::create_dir_all(dir).context(CreateOutputDirSnafu)?;
            }
            for input in &inputs {
                process_file(input, dir, &converter, &cli)?;
            }
        }
    }

    Ok(())
}

/// Expands directories into the `.py` exports they contain.
fn collect_inputs(inputs: &[Input]) -> Vec<Input> {
    let mut collected = Vec::new();
    for input in inputs {
        match input {
            Input::File(path) if path.is_dir() => {
                let mut found: Vec<PathBuf> = WalkDir::new(path)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "py"))
                    .map(walkdir::DirEntry::into_path)
                    .collect();
                found.sort();
                collected.extend(found.into_iter().map(Input::File));
            }
            _ => collected.push(input.clone()),
        }
    }
    collected
}

/// Creates conversion options from CLI arguments.
const fn make_options(cli: &Cli) -> ConversionOptions {
    ConversionOptions {
        include_thinking: cli.include_thinking,
        claude_mode: cli.claude_mode,
    }
}

fn read_input(input: &Input) -> Result<String, Error> {
    let name = input.name();
    match input {
        Input::File(path) => std::fs::read_to_string(path).context(ReadInputSnafu { name }),
        Input::Stdin => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context(ReadInputSnafu { name })?;
            Ok(source)
        }
    }
}

/// Reads and converts one input, reporting its system instruction if asked.
fn convert_input(input: &Input, converter: &Converter, cli: &Cli) -> Result<Conversion, Error> {
    let source = read_input(input)?;
    let conversion = converter
        .convert(&source, &make_options(cli))
        .context(ConvertInputSnafu { name: input.name() })?;

    if cli.show_system
        && let Some(instruction) = &conversion.system_instruction
    {
        eprintln!("System instruction ({}):\n{instruction}\n", input.name());
    }
    Ok(conversion)
}

/// Processes a single input and outputs to stdout.
fn process_to_stdout(input: &Input, converter: &Converter, cli: &Cli) -> Result<(), Error> {
    if cli.dry_run {
        eprintln!("Would output {}", input.name());
        return Ok(());
    }

    let conversion = convert_input(input, converter, cli)?;
    println!("{}", conversion.markdown);
    Ok(())
}

/// Prints one JSON result per input, failing afterwards if any failed.
fn process_json(inputs: &[Input], converter: &Converter, cli: &Cli) -> Result<(), Error> {
    if cli.dry_run {
        for input in inputs {
            eprintln!("Would convert {}", input.name());
        }
        return Ok(());
    }

    let opts = make_options(cli);
    let mut failed = 0usize;
    for input in inputs {
        let result = match read_input(input) {
            Ok(source) => converter.convert_to_result(&source, &opts),
            Err(err) => ConversionResult {
                success: false,
                markdown: None,
                error: Some(err.to_string()),
                message_count: None,
                system_instruction: None,
            },
        };
        if !result.success {
            failed += 1;
        }
        let line = serde_json::to_string(&result).context(SerializeResultSnafu)?;
        println!("{line}");
    }

    ensure!(
        failed == 0,
        ConversionsFailedSnafu {
            count: failed,
            total: inputs.len(),
        }
    );
    Ok(())
}

/// Processes a single input and writes to the output directory.
fn process_file(
    input: &Input,
    out_dir: &Path,
    converter: &Converter,
    cli: &Cli,
) -> Result<(), Error> {
    let out_path = export::output_path(input.path(), out_dir, Utc::now());

    // Handle dry-run mode
    if cli.dry_run {
        eprintln!("Would write {}", out_path.display());
        return Ok(());
    }

    // Check if output exists and handle overwrite
    if out_path.exists() && !cli.force {
        eprintln!(
            "Skipping {} (already exists, use --force to overwrite)",
            out_path.display()
        );
        return Ok(());
    }

    let conversion = convert_input(input, converter, cli)?;
    export::save(&out_path, &conversion.markdown).context(WriteFileSnafu { path: &out_path })?;

    if !cli.quiet {
        eprintln!(
            "Wrote {} ({} messages)",
            out_path.display(),
            conversion.message_count
        );
    }
    Ok(())
}
