//! Middleware pipeline: composable stages wrapped around the network fetch.
//!
//! This module defines the core types for building an ordered middleware stack.
//! Each middleware wraps the next layer, enabling request inspection, short-circuit
//! responses, and response recording without coupling the fetch function to
//! caching or logging concerns.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`FetchHandler`]: type-erased terminal stage that performs the actual fetch;
//!   build one with [`fetch_handler`].
//! - [`from_middleware`]: converts a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`LoggerMiddleware`]: built-in operation logger.
//! - [`cache::CacheMiddleware`]: response cache in front of the network.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::network::{FetchError, FetchResult, Request};

pub mod cache;

pub use cache::{CacheMiddleware, CacheObserver, CacheOptions};

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use relay_cache::middleware::{MiddlewareHandler, Next};
/// use relay_cache::network::Request;
///
/// let handler: MiddlewareHandler = Arc::new(|req: Request, next: Next| {
///     Box::pin(async move { next.run(req).await })
/// });
/// ```
pub type MiddlewareHandler = Arc<
    dyn Fn(Request, Next) -> Pin<Box<dyn Future<Output = FetchResult> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// The terminal stage of a pipeline: sends the request and returns the result.
pub type FetchHandler =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = FetchResult> + Send>> + Send + Sync + 'static>;

/// Erases an async fetch function into a [`FetchHandler`].
///
/// The function is wrapped in an [`Arc`] and shared across every request, so it
/// must be `Send + Sync + 'static`.
pub fn fetch_handler<H, F>(fetch: H) -> FetchHandler
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = FetchResult> + Send + 'static,
{
    Arc::new(move |req: Request| {
        Box::pin(fetch(req)) as Pin<Box<dyn Future<Output = FetchResult> + Send>>
    })
}

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use relay_cache::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |req: Request, next: Next| middleware.handle(req, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the next
/// middleware, and once every middleware has run, the terminal fetch handler.
///
/// `Next` is consumed on each call to [`run`](Self::run), so a middleware can
/// forward a request at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
    fetch: Option<FetchHandler>,
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack,
    /// with no terminal fetch handler.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self::from_shared(middlewares.into())
    }

    pub(crate) fn from_shared(middlewares: Arc<[MiddlewareHandler]>) -> Self {
        Self {
            middlewares,
            index: 0,
            fetch: None,
        }
    }

    /// Sets the handler invoked once the middleware stack is exhausted.
    #[must_use]
    pub fn with_fetch(mut self, fetch: FetchHandler) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Invokes the next stage in the chain and returns its result.
    ///
    /// Advances the internal cursor by one and awaits the handler at the current
    /// position. When no middleware remains the terminal fetch handler is called;
    /// without one the result is [`FetchError::ChainExhausted`].
    pub async fn run(mut self, req: Request) -> FetchResult {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(req, self).await
        } else if let Some(fetch) = self.fetch.take() {
            fetch(req).await
        } else {
            Err(FetchError::ChainExhausted)
        }
    }
}

/// The core trait for all pipeline middleware.
///
/// Implementors receive a [`Request`] and a [`Next`] cursor. They may:
///
/// - **Pass through**: call `next.run(req).await` without modification.
/// - **Short-circuit**: return a response directly without calling `next`.
/// - **Record**: call `next.run(req).await`, inspect the result, and keep a copy.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future.
/// - Failures of the continuation ([`FetchError`]) should be returned, not hidden.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next stage.
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = FetchResult> + Send>>;
}

/// Built-in middleware that logs each operation's kind, id, outcome, and duration.
///
/// Emits a single `tracing::info!` line after the downstream stages complete,
/// or a `tracing::warn!` line when they fail. `LoggerMiddleware` never
/// short-circuits.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = FetchResult> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let kind = req.kind();
            let id = req.id().to_owned();

            let result = next.run(req).await;

            let duration = start.elapsed();
            match &result {
                Ok(res) => tracing::info!(
                    errors = res.errors.len(),
                    "{} {} ({:?})",
                    kind,
                    id,
                    duration
                ),
                Err(e) => tracing::warn!(error = %e, "{} {} failed ({:?})", kind, id, duration),
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::network::{Operation, OperationKind, Response, Variables};
    use serde_json::json;

    fn request() -> Request {
        Request::new(
            Arc::new(Operation::new("Q", OperationKind::Query)),
            Variables::new(),
        )
    }

    fn ok_fetch() -> FetchHandler {
        fetch_handler(|_req: Request| async { Ok(Response::new(json!("network"))) })
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn handle(
            &self,
            req: Request,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = FetchResult> + Send>> {
            let tag = self.0;
            Box::pin(async move {
                let mut res = next.run(req).await?;
                if let Some(trail) = res.data.as_array_mut() {
                    trail.push(json!(tag));
                } else {
                    res.data = json!([tag]);
                }
                Ok(res)
            })
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn handle(
            &self,
            _req: Request,
            _next: Next,
        ) -> Pin<Box<dyn Future<Output = FetchResult> + Send>> {
            Box::pin(async { Ok(Response::new(json!("short"))) })
        }
    }

    #[tokio::test]
    async fn empty_chain_calls_fetch() {
        let res = Next::new(Vec::new()).with_fetch(ok_fetch()).run(request()).await;
        assert_eq!(res.unwrap().data, json!("network"));
    }

    #[tokio::test]
    async fn exhausted_without_fetch() {
        let res = Next::new(Vec::new()).run(request()).await;
        assert!(matches!(res, Err(FetchError::ChainExhausted)));
    }

    #[tokio::test]
    async fn middlewares_run_in_order() {
        let chain = vec![
            from_middleware(Arc::new(Tag("outer"))),
            from_middleware(Arc::new(Tag("inner"))),
        ];
        let res = Next::new(chain).with_fetch(ok_fetch()).run(request()).await.unwrap();
        // The innermost stage decorates first.
        assert_eq!(res.data, json!(["inner", "outer"]));
    }

    #[tokio::test]
    async fn short_circuit_skips_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetch = fetch_handler(move |_req: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Response::default()) }
        });

        let chain = vec![from_middleware(Arc::new(ShortCircuit))];
        let res = Next::new(chain).with_fetch(fetch).run(request()).await.unwrap();

        assert_eq!(res.data, json!("short"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logger_passes_result_through() {
        let chain = vec![from_middleware(Arc::new(LoggerMiddleware))];
        let res = Next::new(chain).with_fetch(ok_fetch()).run(request()).await;
        assert_eq!(res.unwrap().data, json!("network"));
    }

    #[tokio::test]
    async fn logger_passes_failure_through() {
        let chain = vec![from_middleware(Arc::new(LoggerMiddleware))];
        let fetch = fetch_handler(|_req: Request| async { Err(FetchError::Cancelled) });
        let res = Next::new(chain).with_fetch(fetch).run(request()).await;
        assert!(matches!(res, Err(FetchError::Cancelled)));
    }
}
