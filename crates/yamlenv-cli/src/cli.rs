//! yamlenv CLI - render YAML documents with environment variables
//!
//! Usage:
//!   yamlenv render config.yaml --format json
//!   yamlenv render config.yaml --raw --named --set PORT=8080
//!   yamlenv check config.yaml

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indexmap::IndexMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use yamlenv_core::interpolation::{Resolution, DEFAULT_SEPARATOR};
use yamlenv_core::{LoadOptions, Loader, Overlay, ProcessEnv};

/// yamlenv - YAML with environment variable substitution
#[derive(Parser, Debug)]
#[command(name = "yamlenv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Substitute variables and print the resulting document
    Render {
        /// Document to render ("-" reads stdin)
        file: PathBuf,

        #[command(flatten)]
        interpolation: InterpolationArgs,

        /// Leave unresolved references in place instead of failing
        #[arg(long)]
        no_strict: bool,

        /// Print the substituted text without parsing it
        #[arg(long)]
        raw: bool,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the variables a document references and whether they resolve
    Check {
        /// Document to check ("-" reads stdin)
        file: PathBuf,

        #[command(flatten)]
        interpolation: InterpolationArgs,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Args, Debug)]
struct InterpolationArgs {
    /// Also substitute bare $NAME references
    #[arg(short, long)]
    named: bool,

    /// Separator between a variable name and its default
    #[arg(short, long, default_value = DEFAULT_SEPARATOR)]
    separator: String,

    /// Override a variable (NAME=VALUE), may be repeated
    #[arg(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,
}

/// Errors surfaced by CLI commands
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid override '{0}', expected NAME=VALUE")]
    InvalidOverride(String),
    #[error("Failed to serialize output: {0}")]
    Serialize(String),
    #[error("{0}")]
    Load(#[from] yamlenv_core::Error),
}

impl CliError {
    /// 1 for documents that fail to render, 2 for I/O and usage problems
    fn exit_status(&self) -> u8 {
        match self {
            CliError::Load(_) | CliError::Serialize(_) => 1,
            CliError::Read { .. } | CliError::Write { .. } | CliError::InvalidOverride(_) => 2,
        }
    }
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Render {
            file,
            interpolation,
            no_strict,
            raw,
            format,
            output,
        } => cmd_render(&file, &interpolation, !no_strict, raw, &format, output),

        Commands::Check {
            file,
            interpolation,
            format,
        } => cmd_check(&file, &interpolation, &format),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            ExitCode::from(e.exit_status())
        }
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbose {
        0 => return,
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn parse_overrides(overrides: &[String]) -> Result<IndexMap<String, String>, CliError> {
    overrides
        .iter()
        .map(|raw| match raw.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => Err(CliError::InvalidOverride(raw.clone())),
        })
        .collect()
}

fn build_loader(
    args: &InterpolationArgs,
    strict: bool,
) -> Result<Loader<Overlay<IndexMap<String, String>, ProcessEnv>>, CliError> {
    let options = LoadOptions::default()
        .strict(strict)
        .allow_parse_named(args.named)
        .separator(args.separator.clone());
    let overrides = parse_overrides(&args.overrides)?;
    log::debug!("{} variable overrides", overrides.len());

    let env = Overlay::new(overrides, ProcessEnv::capture());
    Ok(Loader::with_options_and_env(options, env)?)
}

fn read_input(file: &Path) -> Result<String, CliError> {
    let result = if file == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).map(|_| text)
    } else {
        std::fs::read_to_string(file)
    };
    result.map_err(|source| CliError::Read {
        path: file.display().to_string(),
        source,
    })
}

fn write_output(content: &str, output: Option<PathBuf>) -> Result<(), CliError> {
    match output {
        Some(path) => {
            std::fs::write(&path, content).map_err(|source| CliError::Write {
                path: path.display().to_string(),
                source,
            })?;
            eprintln!("{} Wrote to {}", "✓".green(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .map_err(|source| CliError::Write {
                    path: "stdout".to_string(),
                    source,
                })?;
        }
    }
    Ok(())
}

fn cmd_render(
    file: &Path,
    args: &InterpolationArgs,
    strict: bool,
    raw: bool,
    format: &str,
    output: Option<PathBuf>,
) -> Result<ExitCode, CliError> {
    let loader = build_loader(args, strict)?;
    let text = read_input(file)?;

    let content = if raw {
        loader.substitute(&text)?
    } else {
        let value = loader
            .load_str(&text)
            .map_err(|e| e.with_path(file.display().to_string()))?;
        match format {
            "json" => serde_json::to_string_pretty(&value)
                .map(|s| s + "\n")
                .map_err(|e| CliError::Serialize(e.to_string()))?,
            _ => serde_yaml::to_string(&value).map_err(|e| CliError::Serialize(e.to_string()))?,
        }
    };

    write_output(&content, output)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(file: &Path, args: &InterpolationArgs, format: &str) -> Result<ExitCode, CliError> {
    let loader = build_loader(args, true)?;
    let text = read_input(file)?;
    let variables = loader.references(&text);
    let report = loader.analyze(&text);

    if format == "json" {
        // Values are left out: they may be secrets.
        let references: Vec<_> = report
            .substitutions
            .iter()
            .map(|s| {
                serde_json::json!({
                    "variable": s.variable,
                    "braced": s.braced,
                    "offset": s.source.start,
                    "resolution": s.resolution,
                })
            })
            .collect();
        let json = serde_json::json!({
            "complete": report.is_complete(),
            "variables": variables,
            "references": references,
            "unresolved": report.unresolved,
            "escapes": report.escapes,
        });
        let pretty =
            serde_json::to_string_pretty(&json).map_err(|e| CliError::Serialize(e.to_string()))?;
        println!("{}", pretty);
    } else {
        println!(
            "{} references {} variable(s): {}",
            file.display(),
            variables.len(),
            variables.join(", ")
        );
        for sub in &report.substitutions {
            let line = line_of(&text, sub.source.start);
            let marker = match sub.resolution {
                Resolution::Environment => "✓".green(),
                Resolution::Default => "✓".yellow(),
                Resolution::Unresolved => "✗".red(),
                Resolution::Inert => "-".dimmed(),
            };
            println!(
                "{} {}:{} {} ({})",
                marker,
                file.display(),
                line,
                sub.variable,
                describe(sub.resolution)
            );
        }

        if report.is_complete() {
            println!(
                "{} {} references resolve",
                "✓".green(),
                report.substitutions.len()
            );
        } else {
            let names: Vec<&str> = report.unresolved.iter().map(String::as_str).collect();
            eprintln!("{} Unresolved: {}", "✗".red(), names.join(", "));
        }
    }

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn describe(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Environment => "environment",
        Resolution::Default => "default",
        Resolution::Unresolved => "unresolved",
        Resolution::Inert => "named parsing disabled",
    }
}

/// 1-based line number of a byte offset
fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
