//! yamlenv-core: environment variable substitution for YAML documents
//!
//! This crate rewrites `${NAME}`, `${NAME|default}`, optional bare `$NAME`
//! references and `$$`/`$<digits>` escapes in a raw document, then parses the
//! result as YAML.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use yamlenv_core::interpolation::interpolate;
//!
//! let mut env = HashMap::new();
//! env.insert("USER".to_string(), "alice".to_string());
//!
//! let out = interpolate("owner: ${USER}\ngroup: ${GROUP|staff}", &env, true, false, "|").unwrap();
//! assert_eq!(out, "owner: alice\ngroup: staff");
//! ```

pub mod environment;
pub mod error;
pub mod interpolation;
pub mod value;

mod loader;

pub use environment::{Environment, FnEnvironment, Overlay, ProcessEnv};
pub use error::{Error, ErrorKind, Result};
pub use interpolation::{InterpolateOptions, Interpolator, Report};
pub use loader::{load, load_with, LoadOptions, Loader};
pub use value::Value;
