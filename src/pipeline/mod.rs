//! Request pipeline: a middleware stack in front of a fetch function.
//!
//! Stages run outermost first: the first middleware added sees every request
//! before the others and sees every result last.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::middleware::{
    FetchHandler, Middleware, MiddlewareHandler, Next, fetch_handler, from_middleware,
};
use crate::network::{FetchResult, Request};

/// An ordered middleware stack terminated by a fetch function.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use relay_cache::middleware::{CacheMiddleware, CacheOptions, LoggerMiddleware};
/// use relay_cache::network::{Operation, OperationKind, Request, Response, Variables};
/// use relay_cache::pipeline::Pipeline;
/// use relay_cache::store::MemoryStore;
///
/// # async fn example() -> Result<(), relay_cache::network::FetchError> {
/// let pipeline = Pipeline::new(|_req: Request| async {
///     Ok(Response::new(serde_json::json!({"viewer": {"id": "1"}})))
/// })
/// .with(LoggerMiddleware)
/// .with(CacheMiddleware::new(Arc::new(MemoryStore::new()), CacheOptions::new()));
///
/// let op = Arc::new(Operation::new("ViewerQuery", OperationKind::Query));
/// let res = pipeline.execute(Request::new(op, Variables::new())).await?;
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    chain: Arc<[MiddlewareHandler]>,
    fetch: FetchHandler,
}

impl Pipeline {
    /// Creates a pipeline with no middleware that sends every request to `fetch`.
    ///
    /// The fetch function is wrapped in an [`Arc`] and shared across every
    /// request, so it must be `Send + Sync + 'static`.
    pub fn new<H, F>(fetch: H) -> Self
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = FetchResult> + Send + 'static,
    {
        Self {
            chain: Arc::from(Vec::<MiddlewareHandler>::new()),
            fetch: fetch_handler(fetch),
        }
    }

    /// Appends `middleware` inside every stage added so far.
    #[must_use]
    pub fn with<M>(self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.with_handler(from_middleware(Arc::new(middleware)))
    }

    /// Appends an already type-erased stage.
    #[must_use]
    pub fn with_handler(mut self, handler: MiddlewareHandler) -> Self {
        let mut chain = self.chain.to_vec();
        chain.push(handler);
        self.chain = chain.into();
        self
    }

    /// Number of middleware stages.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Runs `req` through every stage and the fetch function.
    ///
    /// # Errors
    ///
    /// Returns the [`FetchError`](crate::network::FetchError) raised by the
    /// fetch function or by a stage.
    pub async fn execute(&self, req: Request) -> FetchResult {
        debug!(operation = %req.id(), kind = %req.kind(), "executing operation");
        Next::from_shared(Arc::clone(&self.chain))
            .with_fetch(Arc::clone(&self.fetch))
            .run(req)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::middleware::{CacheMiddleware, CacheOptions, LoggerMiddleware};
    use crate::network::{FetchError, Operation, OperationKind, Response, Variables};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn query() -> Request {
        Request::new(
            Arc::new(Operation::new("Q", OperationKind::Query)),
            Variables::new(),
        )
    }

    fn counting(calls: &Arc<AtomicUsize>) -> Pipeline {
        let counter = Arc::clone(calls);
        Pipeline::new(move |_req: Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(Response::new(json!(n))) }
        })
    }

    #[test]
    fn starts_empty() {
        let p = Pipeline::new(|_req: Request| async { Err(FetchError::Cancelled) });
        assert!(p.is_empty());
        assert_eq!(p.len(), 0);
    }

    #[tokio::test]
    async fn no_middleware_calls_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = counting(&calls).execute(query()).await.unwrap();
        assert_eq!(res.data, json!(1));
    }

    #[tokio::test]
    async fn cache_stage_short_circuits_repeats() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = counting(&calls)
            .with(LoggerMiddleware)
            .with(CacheMiddleware::new(
                Arc::new(MemoryStore::new()),
                CacheOptions::new(),
            ));
        assert_eq!(pipeline.len(), 2);

        pipeline.execute(query()).await.unwrap();
        let res = pipeline.execute(query()).await.unwrap();

        assert_eq!(res.data, json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_surfaces() {
        let pipeline = Pipeline::new(|_req: Request| async {
            Err(FetchError::Status {
                status: 503,
                body: "unavailable".into(),
            })
        })
        .with(LoggerMiddleware);

        let res = pipeline.execute(query()).await;
        assert!(matches!(res, Err(FetchError::Status { status: 503, .. })));
    }
}
