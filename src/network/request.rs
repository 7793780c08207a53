//! Outgoing operation requests.
//!
//! A [`Request`] is built once by the caller and travels unchanged through the
//! middleware pipeline. Stages only read it.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{OperationKind, Variables};

/// A declared operation argument and its default value, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentDefinition {
    pub name: String,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl ArgumentDefinition {
    /// Declares an argument with no default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }

    /// Declares an argument that falls back to `default_value` when unset.
    pub fn with_default(name: impl Into<String>, default_value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default_value: Some(default_value.into()),
        }
    }
}

/// A named query or mutation definition.
///
/// Operations are usually generated ahead of time and shared between many
/// requests, so [`Request`] holds them behind an [`Arc`].
///
/// # Examples
///
/// ```
/// use relay_cache::network::{ArgumentDefinition, Operation, OperationKind};
///
/// let op = Operation::new("UserQuery", OperationKind::Query)
///     .with_id("a1b2c3")
///     .with_argument(ArgumentDefinition::with_default("first", 10));
///
/// assert_eq!(op.cache_id(), "a1b2c3");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Persisted-query identifier, when the operation text is stored server-side.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub kind: OperationKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub argument_definitions: Vec<ArgumentDefinition>,
}

impl Operation {
    /// Creates an operation with no persisted id, text, or arguments.
    ///
    /// # Arguments
    ///
    /// - `name`: the operation name, used as the cache id when no persisted
    ///   id is set.
    /// - `kind`: query, mutation, or subscription.
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            text: None,
            argument_definitions: Vec::new(),
        }
    }

    /// Sets the persisted-query id. Cache keys use it in place of the name.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attaches the operation's source text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Declares an argument. Declared arguments shape the graph store
    /// selector; see [`create_operation_selector`](crate::store::create_operation_selector).
    #[must_use]
    pub fn with_argument(mut self, argument: ArgumentDefinition) -> Self {
        self.argument_definitions.push(argument);
        self
    }

    /// The identifier responses are cached under: the persisted id when
    /// present, the operation name otherwise.
    pub fn cache_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// Per-request cache directives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Always forward to the network, but still allow the result to be cached.
    #[serde(default)]
    pub force: bool,
}

impl CacheConfig {
    /// Directives that skip the cache lookup for this request.
    pub fn force() -> Self {
        Self { force: true }
    }
}

/// A single file attached to a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub name: String,
    pub file_name: String,
    pub content: Bytes,
}

impl Upload {
    /// Creates an upload from a form field name, a file name, and its bytes.
    pub fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

/// The body shape a request will be sent with.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// A JSON body carrying the operation and its variables.
    #[default]
    Json,
    /// A multipart form body carrying uploadables alongside the operation.
    FormData(Vec<Upload>),
}

/// One in-flight operation.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use relay_cache::network::{CacheConfig, Operation, OperationKind, Request, Variables};
///
/// let op = Arc::new(Operation::new("ViewerQuery", OperationKind::Query));
/// let req = Request::new(op, Variables::new()).with_cache_config(CacheConfig::force());
///
/// assert_eq!(req.id(), "ViewerQuery");
/// assert!(req.cache_config().force);
/// assert!(!req.is_mutation());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    operation: Arc<Operation>,
    variables: Variables,
    cache_config: CacheConfig,
    payload: Payload,
}

impl Request {
    /// Creates a JSON request with default cache directives.
    pub fn new(operation: Arc<Operation>, variables: Variables) -> Self {
        Self {
            operation,
            variables,
            cache_config: CacheConfig::default(),
            payload: Payload::Json,
        }
    }

    /// Replaces the per-request cache directives.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use relay_cache::network::{CacheConfig, Operation, OperationKind, Request, Variables};
    ///
    /// let op = Arc::new(Operation::new("FeedQuery", OperationKind::Query));
    /// let req = Request::new(op, Variables::new()).with_cache_config(CacheConfig::force());
    /// assert!(req.cache_config().force);
    /// ```
    #[must_use]
    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    /// Attaches files to the request, switching it to a form-data payload.
    ///
    /// An empty upload list leaves the payload as JSON.
    #[must_use]
    pub fn with_uploadables(mut self, uploads: Vec<Upload>) -> Self {
        if !uploads.is_empty() {
            self.payload = Payload::FormData(uploads);
        }
        self
    }

    /// The operation this request executes.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The variables exactly as supplied by the caller.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// The per-request cache directives.
    pub fn cache_config(&self) -> CacheConfig {
        self.cache_config
    }

    /// The body shape this request will be sent with.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns the identifier used for cache keys. See [`Operation::cache_id`].
    pub fn id(&self) -> &str {
        self.operation.cache_id()
    }

    /// Shorthand for the operation's [`OperationKind`].
    pub fn kind(&self) -> OperationKind {
        self.operation.kind
    }

    /// Returns `true` if the operation is a mutation.
    pub fn is_mutation(&self) -> bool {
        self.operation.kind.is_mutation()
    }

    /// Returns `true` if the request carries uploads.
    pub fn is_form_data(&self) -> bool {
        matches!(self.payload, Payload::FormData(_))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({})", self.kind(), self.id(), self.variables)
    }
}
