//! Cache key derivation.

use std::fmt;

use crate::network::{Request, Variables};

/// Identifies one cached response: an operation identifier plus the
/// canonical rendering of its variables.
///
/// Keys built from variable maps that differ only in key order compare equal.
///
/// # Examples
///
/// ```
/// use relay_cache::cache::CacheKey;
/// use relay_cache::network::Variables;
///
/// let a = CacheKey::new("UserQuery", &Variables::new().with("id", 1).with("size", 32));
/// let b = CacheKey::new("UserQuery", &Variables::new().with("size", 32).with("id", 1));
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation_id: String,
    variables: String,
}

impl CacheKey {
    pub fn new(operation_id: impl Into<String>, variables: &Variables) -> Self {
        Self {
            operation_id: operation_id.into(),
            variables: variables.canonical_json(),
        }
    }

    /// Derives the key for a request from its [`id`](Request::id) and raw variables.
    pub fn for_request(request: &Request) -> Self {
        Self::new(request.id(), request.variables())
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// The canonical JSON form of the variables this key was built from.
    pub fn variables(&self) -> &str {
        &self.variables
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operation_id, self.variables)
    }
}
