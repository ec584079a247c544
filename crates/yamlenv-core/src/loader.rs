//! Loading YAML documents with environment substitution
//!
//! The whole document is interpolated up front and only then handed to the
//! YAML parser, so a reference can never be split across read boundaries.

use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

use crate::environment::{Environment, ProcessEnv};
use crate::error::{Error, Result};
use crate::interpolation::{InterpolateOptions, Interpolator, Report};
use crate::value::Value;

/// Options for loading documents
pub type LoadOptions = InterpolateOptions;

/// Loads single YAML documents after substituting variables
///
/// ```rust
/// use std::collections::HashMap;
/// use yamlenv_core::{LoadOptions, Loader};
///
/// let mut env = HashMap::new();
/// env.insert("DB_HOST".to_string(), "db.internal".to_string());
///
/// let loader = Loader::with_options_and_env(LoadOptions::default(), env).unwrap();
/// let value = loader.load_str("host: ${DB_HOST}\nport: ${DB_PORT|5432}").unwrap();
/// assert_eq!(value.get_path("host").unwrap().as_str(), Some("db.internal"));
/// assert_eq!(value.get_path("port").unwrap().as_i64(), Some(5432));
/// ```
#[derive(Debug, Clone)]
pub struct Loader<E = ProcessEnv> {
    interpolator: Interpolator,
    env: E,
}

impl Loader<ProcessEnv> {
    /// Create a loader reading a snapshot of the process environment
    pub fn new(options: LoadOptions) -> Result<Self> {
        Self::with_options_and_env(options, ProcessEnv::capture())
    }
}

impl<E: Environment> Loader<E> {
    /// Create a loader resolving variables against `env`
    pub fn with_options_and_env(options: LoadOptions, env: E) -> Result<Self> {
        Ok(Self {
            interpolator: Interpolator::new(options)?,
            env,
        })
    }

    /// The options this loader was built with
    pub fn options(&self) -> &LoadOptions {
        self.interpolator.options()
    }

    /// The environment references are resolved against
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Interpolate a document without parsing it
    pub fn substitute(&self, text: &str) -> Result<String> {
        self.interpolator.interpolate(text, &self.env)
    }

    /// Interpolate a document and report every reference, ignoring strict mode
    pub fn analyze(&self, text: &str) -> Report {
        self.interpolator.analyze(text, &self.env)
    }

    /// Distinct variable names the document refers to
    pub fn references(&self, text: &str) -> Vec<String> {
        self.interpolator.references(text)
    }

    /// Load a document from a string
    pub fn load_str(&self, text: &str) -> Result<Value> {
        let substituted = self.substitute(text)?;
        parse_document(&substituted)
    }

    /// Load a document from a string into a typed value
    pub fn load_as<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        let substituted = self.substitute(text)?;
        serde_yaml::from_str(&substituted).map_err(|e| Error::parse(e.to_string()))
    }

    /// Load a document from a reader
    ///
    /// The reader is drained completely before any substitution happens.
    pub fn load_reader<R: Read>(&self, mut reader: R) -> Result<Value> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.load_str(&text)
    }

    /// Load a document from a file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        log::debug!("Loading {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::io(format!("Failed to read file '{}': {}", path.display(), e))
                .with_path(path.display().to_string())
        })?;

        self.load_str(&text)
            .map_err(|e| e.with_path(path.display().to_string()))
    }
}

/// Parse a substituted buffer as exactly one YAML document
fn parse_document(text: &str) -> Result<Value> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| Error::parse(e.to_string()))?;
    Value::from_yaml(yaml)
}

/// Load a YAML document with default options
///
/// Strict mode is on, named references are off, and variables come from the
/// process environment.
pub fn load(text: &str) -> Result<Value> {
    load_with(text, LoadOptions::default())
}

/// Load a YAML document with the given options and the process environment
pub fn load_with(text: &str, options: LoadOptions) -> Result<Value> {
    Loader::new(options)?.load_str(text)
}
