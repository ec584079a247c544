//! yamlenv CLI library
//!
//! This module exposes the CLI entry point so the binary stays a one-liner.

mod cli;

pub use cli::{run, CliError};
