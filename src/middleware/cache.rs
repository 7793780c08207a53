//! Cache middleware. Answers queries from memory or the graph store before
//! they reach the network.
//!
//! Every request passes through a fixed sequence of checks:
//!
//! 1. **Mutations** optionally clear the cache, then bypass it unless
//!    mutations are allowed. Allowed mutations are never answered from the
//!    cache; their results may still be recorded.
//! 2. **Form-data** requests bypass the cache unless allowed.
//! 3. **Forced** requests always go to the network; the result may be recorded.
//! 4. Everything else is answered from the response cache, then from the
//!    [`GraphStore`], then from the network, whose result may be recorded.
//!
//! A response is recorded when it carries no errors, or when errors are
//! explicitly allowed with [`CacheOptions::cache_errors`].
//!
//! ## Failure handling
//!
//! - A failure of the cache or graph store while looking a request up is
//!   logged and the request is forwarded once with no further cache work.
//! - A failure to record a response is logged and the response is returned.
//! - Failures of the network itself ([`FetchError`](crate::network::FetchError))
//!   are returned unchanged and never retried.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheKey, DEFAULT_SIZE, DEFAULT_TTL, QueryResponseCache};
use crate::network::{FetchResult, Request, Response};
use crate::store::{GraphStore, StoreError, create_operation_selector};

use super::{Middleware, Next};

/// Receives the response cache once, right after the middleware creates it.
///
/// Implemented for any `Fn(&Arc<QueryResponseCache>)` closure.
pub trait CacheObserver: Send + Sync {
    fn on_init(&self, cache: &Arc<QueryResponseCache>);
}

impl<F> CacheObserver for F
where
    F: Fn(&Arc<QueryResponseCache>) + Send + Sync,
{
    fn on_init(&self, cache: &Arc<QueryResponseCache>) {
        (self)(cache)
    }
}

/// Configuration for [`CacheMiddleware`].
///
/// Can be built with the builder methods or deserialized from camelCase keys,
/// where `ttl` is given in milliseconds:
///
/// ```
/// use std::time::Duration;
/// use relay_cache::middleware::CacheOptions;
///
/// let opts: CacheOptions = serde_json::from_str(
///     r#"{"size": 250, "ttl": 60000, "clearOnMutation": true}"#,
/// ).unwrap();
///
/// assert_eq!(opts.size, 250);
/// assert_eq!(opts.ttl, Duration::from_secs(60));
/// assert!(opts.clear_on_mutation);
/// assert!(!opts.cache_errors);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheOptions {
    /// Maximum number of cached responses. Zero means the default of 100.
    pub size: usize,
    /// How long a cached response is served. Zero means the default of 15 minutes.
    #[serde(deserialize_with = "deserialize_millis")]
    pub ttl: Duration,
    /// Record mutation results in the cache instead of bypassing it.
    pub allow_mutations: bool,
    /// Let form-data requests use the cache.
    pub allow_form_data: bool,
    /// Empty the cache whenever a mutation passes through.
    pub clear_on_mutation: bool,
    /// Record responses that carry errors.
    pub cache_errors: bool,
    #[serde(skip)]
    on_init: Option<Arc<dyn CacheObserver>>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            ttl: DEFAULT_TTL,
            allow_mutations: false,
            allow_form_data: false,
            clear_on_mutation: false,
            cache_errors: false,
            on_init: None,
        }
    }
}

impl CacheOptions {
    /// Returns the default options: 100 entries, a 15 minute lifetime, and
    /// every `allow_*` and `clear_*` switch off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of cached responses.
    ///
    /// Once the cache is full, expired entries are dropped first, then the
    /// least recently used one.
    ///
    /// # Arguments
    ///
    /// - `size`: entry bound; `0` selects the default of 100.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relay_cache::middleware::CacheOptions;
    ///
    /// let opts = CacheOptions::new().size(250);
    /// assert_eq!(opts.size, 250);
    /// ```
    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets how long a cached response may be served after it was recorded.
    ///
    /// # Arguments
    ///
    /// - `ttl`: entry lifetime; [`Duration::ZERO`] selects the default of 15 minutes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use relay_cache::middleware::CacheOptions;
    ///
    /// let opts = CacheOptions::new().ttl(Duration::from_secs(30));
    /// assert_eq!(opts.ttl, Duration::from_secs(30));
    /// ```
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Lets mutation results be recorded.
    ///
    /// Mutations are still always forwarded; they are never answered from the
    /// cache.
    #[must_use]
    pub fn allow_mutations(mut self, allow: bool) -> Self {
        self.allow_mutations = allow;
        self
    }

    /// Lets requests carrying uploads read and write the cache.
    #[must_use]
    pub fn allow_form_data(mut self, allow: bool) -> Self {
        self.allow_form_data = allow;
        self
    }

    /// Empties the cache before every mutation is forwarded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relay_cache::middleware::CacheOptions;
    ///
    /// let opts = CacheOptions::new().clear_on_mutation(true);
    /// assert!(opts.clear_on_mutation);
    /// ```
    #[must_use]
    pub fn clear_on_mutation(mut self, clear: bool) -> Self {
        self.clear_on_mutation = clear;
        self
    }

    /// Records responses even when their `errors` list is non-empty.
    #[must_use]
    pub fn cache_errors(mut self, cache: bool) -> Self {
        self.cache_errors = cache;
        self
    }

    /// Registers an observer that receives the cache when the middleware is built.
    #[must_use]
    pub fn on_init(mut self, observer: impl CacheObserver + 'static) -> Self {
        self.on_init = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("size", &self.size)
            .field("ttl", &self.ttl)
            .field("allow_mutations", &self.allow_mutations)
            .field("allow_form_data", &self.allow_form_data)
            .field("clear_on_mutation", &self.clear_on_mutation)
            .field("cache_errors", &self.cache_errors)
            .field("on_init", &self.on_init.is_some())
            .finish()
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// A failure of the cache or graph store, as opposed to the network.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("response cache failure: {0}")]
    Cache(#[from] CacheError),

    #[error("graph store failure: {0}")]
    Store(#[from] StoreError),
}

/// How a request travels through [`CacheMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Forward without touching the cache.
    Bypass,
    /// Forward without reading the cache, then record the result.
    Forced(CacheKey),
    /// Answer from the cache or graph store when possible, otherwise forward
    /// and record the result.
    Cached(CacheKey),
}

#[derive(Debug, Clone, Copy)]
struct CachePolicy {
    allow_mutations: bool,
    allow_form_data: bool,
    clear_on_mutation: bool,
    cache_errors: bool,
}

/// Response caching middleware.
///
/// Owns one [`QueryResponseCache`] for its whole lifetime and reads from a
/// shared [`GraphStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use relay_cache::cache::QueryResponseCache;
/// use relay_cache::middleware::{CacheMiddleware, CacheOptions};
/// use relay_cache::store::MemoryStore;
///
/// let cache = CacheMiddleware::new(
///     Arc::new(MemoryStore::new()),
///     CacheOptions::new()
///         .size(250)
///         .ttl(Duration::from_secs(60))
///         .clear_on_mutation(true)
///         .on_init(|cache: &Arc<QueryResponseCache>| println!("cache ready: {cache:?}")),
/// );
/// ```
#[derive(Clone)]
pub struct CacheMiddleware {
    cache: Arc<QueryResponseCache>,
    store: Arc<dyn GraphStore>,
    policy: CachePolicy,
}

impl CacheMiddleware {
    /// Creates the middleware and its cache, then notifies the
    /// [`on_init`](CacheOptions::on_init) observer if one is set.
    pub fn new(store: Arc<dyn GraphStore>, options: CacheOptions) -> Self {
        let cache = Arc::new(QueryResponseCache::new(options.size, options.ttl));

        if let Some(observer) = &options.on_init {
            observer.on_init(&cache);
        }

        Self {
            cache,
            store,
            policy: CachePolicy {
                allow_mutations: options.allow_mutations,
                allow_form_data: options.allow_form_data,
                clear_on_mutation: options.clear_on_mutation,
                cache_errors: options.cache_errors,
            },
        }
    }

    /// The response cache owned by this middleware.
    pub fn cache(&self) -> &Arc<QueryResponseCache> {
        &self.cache
    }

    /// Decides how `req` is handled. Does not look at the cache contents.
    pub fn route(&self, req: &Request) -> Route {
        if req.is_mutation() && !self.policy.allow_mutations {
            return Route::Bypass;
        }
        if req.is_form_data() && !self.policy.allow_form_data {
            return Route::Bypass;
        }

        let key = CacheKey::for_request(req);
        if req.cache_config().force || req.is_mutation() {
            Route::Forced(key)
        } else {
            Route::Cached(key)
        }
    }

    fn clear_for_mutation(&self, req: &Request) {
        if !(req.is_mutation() && self.policy.clear_on_mutation) {
            return;
        }
        match self.cache.clear() {
            Ok(()) => debug!(operation = %req.id(), "response cache cleared by mutation"),
            Err(e) => warn!(operation = %req.id(), error = %e, "failed to clear response cache"),
        }
    }

    /// Looks `req` up in the response cache, then in the graph store.
    fn resolve(&self, req: &Request, key: &CacheKey) -> Result<Option<Response>, InfrastructureError> {
        if let Some(res) = self.cache.get(key)? {
            debug!(operation = %req.id(), "served from response cache");
            return Ok(Some(res));
        }

        let selector = create_operation_selector(req.operation(), req.variables());
        if self.store.check(&selector)? {
            let res = self.store.lookup(&selector)?;
            debug!(operation = %req.id(), "served from graph store");
            return Ok(Some(res));
        }

        Ok(None)
    }

    fn record(&self, key: CacheKey, res: &Response) {
        if res.has_errors() && !self.policy.cache_errors {
            debug!(key = %key, errors = res.errors.len(), "response has errors, not cached");
            return;
        }
        if let Err(e) = self.cache.set(key, res.clone()) {
            warn!(error = %e, "failed to record response in cache");
        }
    }

    async fn forward_and_record(&self, key: CacheKey, req: Request, next: Next) -> FetchResult {
        let res = next.run(req).await?;
        self.record(key, &res);
        Ok(res)
    }
}

impl fmt::Debug for CacheMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheMiddleware")
            .field("cache", &self.cache)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Middleware for CacheMiddleware {
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = FetchResult> + Send>> {
        let this = self.clone();

        Box::pin(async move {
            this.clear_for_mutation(&req);

            match this.route(&req) {
                Route::Bypass => next.run(req).await,
                Route::Forced(key) => this.forward_and_record(key, req, next).await,
                Route::Cached(key) => match this.resolve(&req, &key) {
                    Ok(Some(res)) => Ok(res),
                    Ok(None) => this.forward_and_record(key, req, next).await,
                    Err(e) => {
                        warn!(
                            operation = %req.id(),
                            error = %e,
                            "cache lookup failed, forwarding without cache"
                        );
                        next.run(req).await
                    }
                },
            }
        })
    }
}
