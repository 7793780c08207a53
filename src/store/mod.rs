//! Normalized graph store contract.
//!
//! The cache middleware consults a [`GraphStore`] as a secondary cache: when the
//! store already holds every field an operation selects, the response is read
//! from it instead of the network. How the store normalizes and indexes data
//! is up to the implementation; this module only defines the read contract,
//! the [`Selector`] that addresses it, and a simple [`MemoryStore`].

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::network::{Operation, Response, Variables};

/// Data id of the root record every operation selector starts from.
pub const ROOT_ID: &str = "client:root";

/// Errors produced by a [`GraphStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no data available for selector {selector}")]
    Missing { selector: String },

    #[error("graph store lock poisoned")]
    Poisoned,

    #[error("graph store unavailable: {0}")]
    Unavailable(String),
}

/// A reference into the store naming the root record, the operation whose
/// fields are selected, and the variables those fields are read with.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub data_id: String,
    pub node: String,
    pub variables: Variables,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}{}", self.data_id, self.node, self.variables)
    }
}

/// Builds the root selector for `operation` executed with `variables`.
///
/// Declared arguments take the supplied value when it is present and not
/// `null`, otherwise their default (or `null`). Variables the operation does
/// not declare are dropped. An operation without argument definitions keeps
/// the supplied variables unchanged.
///
/// # Examples
///
/// ```
/// use relay_cache::network::{ArgumentDefinition, Operation, OperationKind, Variables};
/// use relay_cache::store::create_operation_selector;
/// use serde_json::json;
///
/// let op = Operation::new("FeedQuery", OperationKind::Query)
///     .with_argument(ArgumentDefinition::with_default("first", 10));
///
/// let selector = create_operation_selector(&op, &Variables::new().with("unused", true));
/// assert_eq!(selector.variables.get("first"), Some(&json!(10)));
/// assert!(!selector.variables.contains("unused"));
/// ```
pub fn create_operation_selector(operation: &Operation, variables: &Variables) -> Selector {
    let variables = if operation.argument_definitions.is_empty() {
        variables.clone()
    } else {
        operation
            .argument_definitions
            .iter()
            .map(|def| {
                let value = variables
                    .get(&def.name)
                    .filter(|v| !v.is_null())
                    .or(def.default_value.as_ref())
                    .cloned()
                    .unwrap_or(Value::Null);
                (def.name.clone(), value)
            })
            .collect()
    };

    Selector {
        data_id: ROOT_ID.to_owned(),
        node: operation.name.clone(),
        variables,
    }
}

/// Read access to a store of previously fetched graph data.
///
/// # Contract
///
/// - Both methods are synchronous reads without caching side effects.
/// - [`lookup`](Self::lookup) is only expected to succeed for selectors that
///   [`check`](Self::check) reported as available.
/// - Implementations **must** be `Send + Sync`; one store is shared by every
///   request in flight.
pub trait GraphStore: Send + Sync {
    /// Returns `true` if the store holds every field `selector` asks for.
    fn check(&self, selector: &Selector) -> Result<bool, StoreError>;

    /// Materializes a response from the data currently held for `selector`.
    fn lookup(&self, selector: &Selector) -> Result<Response, StoreError>;
}

/// A [`GraphStore`] holding fully materialized data per selector.
///
/// Useful for tests and for applications that publish whole operation results.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `data` available for `selector`, replacing previous data.
    pub fn publish(&self, selector: &Selector, data: Value) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        records.insert(selector.to_string(), data);
        debug!(selector = %selector, "graph store published");
        Ok(())
    }

    /// Removes the data held for `selector`, returning it.
    pub fn remove(&self, selector: &Selector) -> Result<Option<Value>, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        Ok(records.remove(&selector.to_string()))
    }
}

impl GraphStore for MemoryStore {
    fn check(&self, selector: &Selector) -> Result<bool, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.contains_key(&selector.to_string()))
    }

    fn lookup(&self, selector: &Selector) -> Result<Response, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        records
            .get(&selector.to_string())
            .cloned()
            .map(Response::new)
            .ok_or_else(|| StoreError::Missing {
                selector: selector.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ArgumentDefinition, OperationKind};
    use serde_json::json;

    fn feed() -> Operation {
        Operation::new("FeedQuery", OperationKind::Query)
            .with_argument(ArgumentDefinition::with_default("first", 10))
            .with_argument(ArgumentDefinition::new("after"))
    }

    // ── create_operation_selector ─────────────────────────────────────────────

    #[test]
    fn selector_starts_at_root() {
        let sel = create_operation_selector(&feed(), &Variables::new());
        assert_eq!(sel.data_id, ROOT_ID);
        assert_eq!(sel.node, "FeedQuery");
    }

    #[test]
    fn selector_applies_defaults() {
        let sel = create_operation_selector(&feed(), &Variables::new());
        assert_eq!(sel.variables.get("first"), Some(&json!(10)));
        assert_eq!(sel.variables.get("after"), Some(&Value::Null));
    }

    #[test]
    fn selector_supplied_value_wins() {
        let vars = Variables::new().with("first", 3).with("after", "c1");
        let sel = create_operation_selector(&feed(), &vars);
        assert_eq!(sel.variables.get("first"), Some(&json!(3)));
        assert_eq!(sel.variables.get("after"), Some(&json!("c1")));
    }

    #[test]
    fn selector_null_falls_back_to_default() {
        let vars = Variables::new().with("first", Value::Null);
        let sel = create_operation_selector(&feed(), &vars);
        assert_eq!(sel.variables.get("first"), Some(&json!(10)));
    }

    #[test]
    fn selector_drops_undeclared() {
        let vars = Variables::new().with("extra", 1);
        let sel = create_operation_selector(&feed(), &vars);
        assert!(!sel.variables.contains("extra"));
        assert_eq!(sel.variables.len(), 2);
    }

    #[test]
    fn selector_without_definitions_keeps_variables() {
        let op = Operation::new("Q", OperationKind::Query);
        let vars = Variables::new().with("id", 1);
        let sel = create_operation_selector(&op, &vars);
        assert_eq!(sel.variables, vars);
    }

    // ── MemoryStore ───────────────────────────────────────────────────────────

    #[test]
    fn empty_store_checks_false() {
        let store = MemoryStore::new();
        let sel = create_operation_selector(&feed(), &Variables::new());
        assert!(!store.check(&sel).unwrap());
        assert!(matches!(store.lookup(&sel), Err(StoreError::Missing { .. })));
    }

    #[test]
    fn publish_then_lookup() {
        let store = MemoryStore::new();
        let sel = create_operation_selector(&feed(), &Variables::new());
        store.publish(&sel, json!({"feed": []})).unwrap();

        assert!(store.check(&sel).unwrap());
        let res = store.lookup(&sel).unwrap();
        assert_eq!(res.data, json!({"feed": []}));
        assert!(!res.has_errors());
    }

    #[test]
    fn lookup_distinguishes_variables() {
        let store = MemoryStore::new();
        let a = create_operation_selector(&feed(), &Variables::new().with("first", 1));
        let b = create_operation_selector(&feed(), &Variables::new().with("first", 2));
        store.publish(&a, json!({"n": 1})).unwrap();
        assert!(!store.check(&b).unwrap());
    }

    #[test]
    fn remove() {
        let store = MemoryStore::new();
        let sel = create_operation_selector(&feed(), &Variables::new());
        store.publish(&sel, json!(1)).unwrap();
        assert_eq!(store.remove(&sel).unwrap(), Some(json!(1)));
        assert!(!store.check(&sel).unwrap());
    }
}
