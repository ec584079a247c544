//! Error types for yamlenv
//!
//! Errors are structured: a kind, optional path context, an optional
//! underlying cause and an actionable help message.

use std::fmt;

/// Result type alias for yamlenv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for yamlenv operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path in the document (e.g., "database.port") or the file being loaded
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Strict mode found references with no value and no default
    UnresolvedVariables {
        /// Sorted, deduplicated variable names
        names: Vec<String>,
    },
    /// Interpolation options that cannot be used
    InvalidOptions,
    /// The substituted document is not valid YAML
    Parse,
    /// Accessing a path that doesn't exist
    PathNotFound,
    /// Type coercion failed
    TypeCoercion,
    /// I/O error (file not found, unreadable stream, etc.)
    Io,
}

impl Error {
    /// Create an unresolved variables error
    ///
    /// The names are sorted and deduplicated so the message is stable.
    pub fn unresolved<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();

        let example = names.first().cloned().unwrap_or_else(|| "NAME".into());
        Self {
            kind: ErrorKind::UnresolvedVariables { names },
            path: None,
            help: Some(format!(
                "Export the missing variables or provide a default: ${{{}|default}}",
                example
            )),
            cause: None,
        }
    }

    /// Create an invalid options error
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidOptions,
            path: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            path: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            kind: ErrorKind::PathNotFound,
            path: Some(path_str.clone()),
            help: Some(format!("Check that '{}' exists in the document", path_str)),
            cause: None,
        }
    }

    /// Create a type coercion error
    pub fn type_coercion(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::TypeCoercion,
            path: Some(path.into()),
            help: Some(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            )),
            cause: Some(format!("Got: {}", got.into())),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Io,
            path: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// The unresolved variable names, if this is a strict-mode failure
    pub fn unresolved_names(&self) -> Option<&[String]> {
        match &self.kind {
            ErrorKind::UnresolvedVariables { names } => Some(names),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::UnresolvedVariables { names } => {
                let listed: Vec<String> = names.iter().map(|n| format!("${}", n)).collect();
                write!(
                    f,
                    "Strict mode enabled, variables {} are not defined!",
                    listed.join(", ")
                )?
            }
            ErrorKind::InvalidOptions => write!(f, "Invalid interpolation options")?,
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::PathNotFound => write!(f, "Path not found")?,
            ErrorKind::TypeCoercion => write!(f, "Type coercion failed")?,
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::io(err.to_string())
    }
}
