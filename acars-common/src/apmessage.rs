//! Flat key/value view of a message ("APMessage")
//!
//! Every filter, annotator and receiver works against this view so the step
//! chain treats ACARS and VDLM2 records the same way.
//!
//! **Key layout:**
//! - Verbatim record fields use dot paths (`vdl2.avlc.acars.reg`), sequences
//!   use `[i]` segments and keyed containers use the key as a segment
//! - Canonical aliases carry the `ACARSProcessor.` prefix so they can never
//!   collide with verbatim paths
//!
//! Typed accessors never fail: a missing key or a type mismatch yields the
//! zero value of the requested type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix carried by every canonical alias key
pub const ALIAS_PREFIX: &str = "ACARSProcessor.";

/// Build the full key of a canonical alias, e.g. `ACARSProcessor.TailCode`
pub fn alias_key(alias: &str) -> String {
    format!("{}{}", ALIAS_PREFIX, alias)
}

/// Primitive value stored in an [`APMessage`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Flat mapping from dot-path key to primitive value
///
/// Backed by a `BTreeMap` so iteration (and therefore rendering and
/// serialization) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct APMessage(BTreeMap<String, Value>);

impl APMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set a canonical alias (`ACARSProcessor.<alias>`)
    pub fn set_alias(&mut self, alias: &str, value: impl Into<Value>) {
        self.0.insert(alias_key(alias), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a canonical alias value
    pub fn alias(&self, alias: &str) -> Option<&Value> {
        self.0.get(&alias_key(alias))
    }

    /// Get a value, treating explicit nulls as absent
    pub fn get_present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// String value for `key`, or `""` when missing or not a string
    pub fn get_as_string(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Integer value for `key`, or `0` when missing or not an integer
    pub fn get_as_int(&self, key: &str) -> i64 {
        match self.0.get(key) {
            Some(Value::Int(i)) => *i,
            _ => 0,
        }
    }

    /// Float value for `key`, or `0.0` when missing or not numeric
    ///
    /// Integers widen to floats; nothing else converts.
    pub fn get_as_float(&self, key: &str) -> f64 {
        match self.0.get(key) {
            Some(Value::Float(x)) => *x,
            Some(Value::Int(i)) => *i as f64,
            _ => 0.0,
        }
    }

    /// Boolean value for `key`, or `false` when missing or not a boolean
    pub fn get_as_bool(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Bool(true)))
    }

    /// Merge `other` into `self`, `other` wins on key collision
    pub fn extend(&mut self, other: APMessage) {
        self.0.extend(other.0);
    }

    /// Keep only the listed keys
    pub fn retain_keys(&mut self, keys: &[String]) {
        self.0.retain(|k, _| keys.iter().any(|allowed| allowed == k));
    }
}

impl FromIterator<(String, Value)> for APMessage {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        APMessage(iter.into_iter().collect())
    }
}

impl IntoIterator for APMessage {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// New map holding the entries of `a` then `b` (`b` wins ties)
///
/// Neither input is modified.
pub fn merge_ap_messages(a: &APMessage, b: &APMessage) -> APMessage {
    let mut merged = a.clone();
    for (k, v) in b.iter() {
        merged.0.insert(k.clone(), v.clone());
    }
    merged
}

/// Append `segment` to a dot path
pub fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

/// Recursive flattening of typed values into an [`APMessage`]
///
/// Record types implement this by hand, field by field, which keeps the
/// projection table resolved at compile time.
pub trait Flatten {
    fn flatten_into(&self, path: &str, out: &mut APMessage);
}

macro_rules! flatten_primitive {
    ($($t:ty),*) => {
        $(
            impl Flatten for $t {
                fn flatten_into(&self, path: &str, out: &mut APMessage) {
                    out.insert(path, Value::from(self.clone()));
                }
            }
        )*
    };
}

flatten_primitive!(bool, i64, i32, u32, f64, String);

impl<T: Flatten> Flatten for Option<T> {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        if let Some(inner) = self {
            inner.flatten_into(path, out);
        }
    }
}

impl<T: Flatten> Flatten for Vec<T> {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        for (i, item) in self.iter().enumerate() {
            item.flatten_into(&format!("{}[{}]", path, i), out);
        }
    }
}

impl<T: Flatten> Flatten for BTreeMap<String, T> {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        for (key, item) in self {
            item.flatten_into(&join_path(path, key), out);
        }
    }
}
