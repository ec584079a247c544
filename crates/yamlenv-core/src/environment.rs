//! Variable sources for interpolation
//!
//! An [`Environment`] is a read-only, case-sensitive mapping from variable
//! name to value. The interpolator never mutates it, so any map type can be
//! injected (tests use plain `HashMap`s) and the live process environment is
//! only ever read through a [`ProcessEnv`] snapshot.

use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// A read-only source of variable values
pub trait Environment {
    /// Look up a variable by its exact (case-sensitive) name
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>>;
}

impl<E: Environment + ?Sized> Environment for &E {
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).lookup(name)
    }
}

impl<S: std::hash::BuildHasher> Environment for HashMap<String, String, S> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl Environment for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl Environment for IndexMap<String, String> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|v| Cow::Borrowed(v.as_str()))
    }
}

/// Snapshot of the process environment taken at construction time
///
/// Later changes to the process environment are not observed, which keeps
/// every interpolation over one snapshot consistent.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnv {
    vars: HashMap<String, String>,
}

impl ProcessEnv {
    /// Capture the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        let vars: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        log::trace!("Captured {} process environment variables", vars.len());
        Self { vars }
    }

    /// Number of captured variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Environment for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        self.vars.lookup(name)
    }
}

/// A function-based environment
pub struct FnEnvironment<F>
where
    F: Fn(&str) -> Option<String>,
{
    func: F,
}

impl<F> FnEnvironment<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Create a new function-based environment
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Environment for FnEnvironment<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        (self.func)(name).map(Cow::Owned)
    }
}

/// Two environments layered on top of each other
///
/// The upper layer wins; the lower one is consulted only for names the upper
/// layer does not define.
#[derive(Debug, Clone)]
pub struct Overlay<U, L> {
    upper: U,
    lower: L,
}

impl<U: Environment, L: Environment> Overlay<U, L> {
    /// Layer `upper` over `lower`
    pub fn new(upper: U, lower: L) -> Self {
        Self { upper, lower }
    }
}

impl<U: Environment, L: Environment> Environment for Overlay<U, L> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        self.upper
            .lookup(name)
            .or_else(|| self.lower.lookup(name))
    }
}
