use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::error::RuntimeError;

/// Declared type of an operator attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Float,
    Int,
    String,
    Floats,
    Ints,
    Strings,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Float => "float",
            AttributeKind::Int => "int",
            AttributeKind::String => "string",
            AttributeKind::Floats => "floats",
            AttributeKind::Ints => "ints",
            AttributeKind::Strings => "strings",
        };
        write!(f, "{}", name)
    }
}

/// A single attribute value attached to a graph node.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(f32),
    Int(i64),
    String(String),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<String>),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Float(_) => AttributeKind::Float,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::String(_) => AttributeKind::String,
            AttributeValue::Floats(_) => AttributeKind::Floats,
            AttributeValue::Ints(_) => AttributeKind::Ints,
            AttributeValue::Strings(_) => AttributeKind::Strings,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("attribute '{key}': expected {expected}, got {got}")]
pub struct AttributeError {
    pub key: String,
    pub expected: AttributeKind,
    pub got: AttributeKind,
}

impl AttributeError {
    /// Attaches the operator name.
    pub fn into_runtime(self, op: &str) -> RuntimeError {
        RuntimeError::InvalidAttribute {
            op: op.to_string(),
            reason: format!("expected {}, got {}", self.expected, self.got),
            attribute: self.key,
        }
    }
}

type AttrResult<T> = std::result::Result<Option<T>, AttributeError>;

/// Named attributes of one node.
///
/// Getters return `Ok(None)` for an absent key and an error when the key
/// is present with a different type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: HashMap<String, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn mismatch(key: &str, expected: AttributeKind, got: &AttributeValue) -> AttributeError {
        AttributeError {
            key: key.to_string(),
            expected,
            got: got.kind(),
        }
    }

    pub fn get_int(&self, key: &str) -> AttrResult<i64> {
        match self.entries.get(key) {
            Some(AttributeValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(Self::mismatch(key, AttributeKind::Int, other)),
            None => Ok(None),
        }
    }

    pub fn get_float(&self, key: &str) -> AttrResult<f32> {
        match self.entries.get(key) {
            Some(AttributeValue::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(Self::mismatch(key, AttributeKind::Float, other)),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, key: &str) -> AttrResult<&str> {
        match self.entries.get(key) {
            Some(AttributeValue::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(Self::mismatch(key, AttributeKind::String, other)),
            None => Ok(None),
        }
    }

    pub fn get_floats(&self, key: &str) -> AttrResult<&[f32]> {
        match self.entries.get(key) {
            Some(AttributeValue::Floats(v)) => Ok(Some(v.as_slice())),
            Some(other) => Err(Self::mismatch(key, AttributeKind::Floats, other)),
            None => Ok(None),
        }
    }

    pub fn get_ints(&self, key: &str) -> AttrResult<&[i64]> {
        match self.entries.get(key) {
            Some(AttributeValue::Ints(v)) => Ok(Some(v.as_slice())),
            Some(other) => Err(Self::mismatch(key, AttributeKind::Ints, other)),
            None => Ok(None),
        }
    }

    pub fn get_strings(&self, key: &str) -> AttrResult<&[String]> {
        match self.entries.get(key) {
            Some(AttributeValue::Strings(v)) => Ok(Some(v.as_slice())),
            Some(other) => Err(Self::mismatch(key, AttributeKind::Strings, other)),
            None => Ok(None),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        Attributes {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
