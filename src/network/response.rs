//! Operation responses.
//!
//! A [`Response`] is a well-formed payload. Application errors reported by the
//! server travel inside it in [`Response::errors`]; they are not failures of
//! the pipeline itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An error reported by the server alongside (possibly partial) data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }
}

/// The payload returned for one operation.
///
/// # Examples
///
/// ```
/// use relay_cache::network::{GraphError, Response};
/// use serde_json::json;
///
/// let ok = Response::new(json!({"viewer": {"id": "1"}}));
/// assert!(!ok.has_errors());
///
/// let partial = ok.clone().with_error(GraphError::new("field failed"));
/// assert!(partial.has_errors());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphError>,
}

impl Response {
    /// Creates an error-free response.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    /// Appends an error to the response.
    #[must_use]
    pub fn with_error(mut self, error: GraphError) -> Self {
        self.errors.push(error);
        self
    }

    /// Returns `true` if the server reported at least one error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
