//! Operation variables with an order-independent canonical form.
//!
//! Two variable maps that hold the same names and values must derive the same
//! cache key no matter how they were built, so [`Variables::canonical_json`]
//! renders every object (at any depth) with its keys sorted.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A `name → value` map of operation variables.
///
/// # Examples
///
/// ```
/// use relay_cache::network::Variables;
/// use serde_json::json;
///
/// let mut a = Variables::new();
/// a.insert("first", json!(10));
/// a.insert("after", json!("cursor"));
///
/// let mut b = Variables::new();
/// b.insert("after", json!("cursor"));
/// b.insert("first", json!(10));
///
/// assert_eq!(a.canonical_json(), b.canonical_json());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables {
    inner: Map<String, Value>,
}

impl Variables {
    /// Creates an empty variable map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing any previous value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.insert(name.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    /// Returns `true` if a value is bound to `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Removes the binding for `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.inner.remove(name)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders the variables as compact JSON with object keys sorted at every
    /// nesting level. Array order is significant and kept as-is.
    /// Numbers compare by value: a float with an integral value renders as
    /// the integer, so `{"n": 1.0}` and `{"n": 1}` agree.
    pub fn canonical_json(&self) -> String {
        Value::Object(sort_object(&self.inner)).to_string()
    }
}

impl From<Map<String, Value>> for Variables {
    fn from(inner: Map<String, Value>) -> Self {
        Self { inner }
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_json())
    }
}

/// Rebuilds `value` with every object's keys sorted and integral floats
/// folded into integers, so `1.0` and `1` render alike.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sort_object(map)),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && is_integral(f) => Value::from(f as i64),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn sort_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by_key(|(k, _)| *k);
    entries
        .into_iter()
        .map(|(k, v)| (k.clone(), canonicalize(v)))
        .collect()
}

// i64::MAX is not representable as f64; its nearest neighbour is 2^63.
fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}
