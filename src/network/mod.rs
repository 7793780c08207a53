//! Operation request and response types.
//!
//! This module provides the values that flow through the pipeline:
//! [`Request`], [`Response`], [`Variables`], and the continuation failure type
//! [`FetchError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod request;
pub mod response;
pub mod variables;

pub use request::{ArgumentDefinition, CacheConfig, Operation, Payload, Request, Upload};
pub use response::{GraphError, Response};
pub use variables::Variables;

/// The kind of a graph operation.
///
/// # Examples
///
/// ```
/// use relay_cache::network::OperationKind;
///
/// let kind: OperationKind = "mutation".parse().unwrap();
/// assert!(kind.is_mutation());
/// assert_eq!(kind.as_str(), "mutation");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(self, Self::Mutation)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operation kind.
#[derive(Debug, Error)]
#[error("unknown operation kind: {0}")]
pub struct UnknownOperationKind(String);

impl std::str::FromStr for OperationKind {
    type Err = UnknownOperationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Self::Query),
            "mutation" => Ok(Self::Mutation),
            "subscription" => Ok(Self::Subscription),
            other => Err(UnknownOperationKind(other.to_owned())),
        }
    }
}

/// Failures raised by the continuation itself, as opposed to application
/// errors carried inside a [`Response`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,

    #[error("no stage in the pipeline produced a response")]
    ChainExhausted,
}

/// Result of running a request through the remainder of a pipeline.
pub type FetchResult = Result<Response, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            OperationKind::Query,
            OperationKind::Mutation,
            OperationKind::Subscription,
        ] {
            assert_eq!(kind.as_str().parse::<OperationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        let err = "fragment".parse::<OperationKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown operation kind: fragment");
    }

    #[test]
    fn only_mutation_is_mutation() {
        assert!(OperationKind::Mutation.is_mutation());
        assert!(!OperationKind::Query.is_mutation());
        assert!(!OperationKind::Subscription.is_mutation());
    }

    #[test]
    fn fetch_error_display() {
        let err = FetchError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(
            err.to_string(),
            "server responded with status 502: bad gateway"
        );
    }
}
