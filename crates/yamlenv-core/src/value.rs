//! Parsed document tree
//!
//! What the YAML parser produces once substitution is done. Mapping keys are
//! always strings and keep their document order.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{Error, Result};

/// A node of a loaded document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// Convert a parsed YAML value
    ///
    /// Scalar mapping keys are stringified (`1: a` has key `"1"`); tags are
    /// dropped in favour of the tagged value.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Result<Self> {
        Ok(match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => Value::Sequence(
                seq.into_iter()
                    .map(Value::from_yaml)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_yaml::Value::Mapping(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(yaml_key(key)?, Value::from_yaml(value)?);
                }
                Value::Mapping(out)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value)?,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Floats, and integers widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            Value::Integer(i) => Some(i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a nested node with a dotted path such as `servers[0].host`
    ///
    /// An empty path is the node itself.
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        split_path(path)?
            .into_iter()
            .try_fold(self, |node, step| {
                match (node, step) {
                    (Value::Mapping(map), Step::Key(key)) => map.get(key),
                    (Value::Sequence(seq), Step::Index(i)) => seq.get(i),
                    _ => None,
                }
                .ok_or_else(|| Error::path_not_found(path))
            })
    }

    /// The scalar at `path` rendered as text
    pub fn get_string(&self, path: &str) -> Result<String> {
        match self.get_path(path)? {
            Value::String(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(Error::type_coercion(path, "string", other.type_name())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(Error::parse(format!("Unsupported mapping key: {:?}", other))),
    }
}

#[derive(Debug, PartialEq)]
enum Step<'p> {
    Key(&'p str),
    Index(usize),
}

/// Split `a.b[2].c` into steps; empty keys (`a..b`, leading dots) are skipped
fn split_path(path: &str) -> Result<Vec<Step<'_>>> {
    let mut steps = Vec::new();

    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(open) => part.split_at(open),
            None => (part, ""),
        };
        if key.contains(']') {
            return Err(Error::parse(format!("Unexpected ']' in path: {}", path)));
        }
        if !key.is_empty() {
            steps.push(Step::Key(key));
        }

        while let Some(inner) = rest.strip_prefix('[') {
            let (index, tail) = inner
                .split_once(']')
                .ok_or_else(|| Error::parse(format!("Unclosed '[' in path: {}", path)))?;
            let index = index
                .parse()
                .map_err(|_| Error::parse(format!("Invalid array index in path: {}", index)))?;
            steps.push(Step::Index(index));
            rest = tail;
        }
        if !rest.is_empty() {
            return Err(Error::parse(format!("Unexpected '{}' in path: {}", rest, path)));
        }
    }

    Ok(steps)
}
