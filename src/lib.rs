//! # relay_cache
//!
//! Response caching for an async graph-query network layer.
//!
//! A [`CacheMiddleware`] sits in a [`Pipeline`] in front of the network fetch and
//! decides, per operation, whether to answer from a bounded in-memory cache,
//! from a previously populated [`GraphStore`](store::GraphStore), or by
//! forwarding the request and recording the result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use relay_cache::{CacheMiddleware, CacheOptions, Pipeline, Request, Response};
//! use relay_cache::network::{Operation, OperationKind, Variables};
//! use relay_cache::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(|_req: Request| async {
//!         Ok(Response::new(serde_json::json!({"viewer": {"name": "Ada"}})))
//!     })
//!     .with(CacheMiddleware::new(
//!         Arc::new(MemoryStore::new()),
//!         CacheOptions::new().ttl(Duration::from_secs(60)),
//!     ));
//!
//!     let op = Arc::new(Operation::new("ViewerQuery", OperationKind::Query));
//!     let first = pipeline.execute(Request::new(op.clone(), Variables::new())).await?;
//!     let again = pipeline.execute(Request::new(op, Variables::new())).await?;
//!     assert_eq!(first, again);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod middleware;
pub mod network;
pub mod pipeline;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheKey, QueryResponseCache};
pub use middleware::{CacheMiddleware, CacheOptions, LoggerMiddleware, Middleware, Next};
pub use network::{FetchError, Request, Response};
pub use pipeline::Pipeline;
