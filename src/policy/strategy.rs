//! The two interception strategies and their shared cache plumbing.
//!
//! Both are linear pipelines with a single fallback hop:
//!
//! ```text
//! NetworkFirst:  fetch ──ok──▶ spawn(put copy) ──▶ Resolved
//!                  └─err──▶ get ──hit──▶ Resolved
//!                                 └─miss─▶ Failed
//!
//! CacheFirst:    get ──hit──▶ Resolved
//!                 └─miss──▶ fetch ──ok──▶ spawn(put copy) ──▶ Resolved
//!                                  └─err─▶ Failed
//! ```
//!
//! The client's validators (`If-None-Match` and friends) never reach the
//! network: the cache must be filled with complete representations, so every
//! fetch asks for one. Should an upstream still answer `304` or `206`, the
//! response is passed on but not stored.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::InterceptError;
use crate::cache::CacheStorage;
use crate::fetch::Fetch;
use crate::http::{Request, Response, StatusCode};

/// Request headers that make the upstream answer relative to the client's own copy.
const CONDITIONAL_HEADERS: &[&str] = &[
    "if-none-match",
    "if-modified-since",
    "if-match",
    "if-unmodified-since",
    "if-range",
];

/// Returns the request the strategies actually send to the network.
fn unconditional(request: &Request) -> Request {
    request.without_headers(CONDITIONAL_HEADERS)
}

/// One namespace of a [`CacheStorage`], with best-effort read and write helpers.
#[derive(Clone)]
pub(crate) struct NamespacedStore {
    storage: Arc<dyn CacheStorage>,
    namespace: Arc<str>,
}

impl NamespacedStore {
    pub(crate) fn new(storage: Arc<dyn CacheStorage>, namespace: &str) -> Self {
        Self {
            storage,
            namespace: Arc::from(namespace),
        }
    }

    /// Look `request` up. A store failure is logged and reported as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        let cache = match self.storage.open(&self.namespace).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "cache open failed, treating as miss");
                return None;
            }
        };
        match cache.get(request).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(url = %request.url(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a copy of `response` under `request` on a detached task.
    ///
    /// The copy is taken before returning, so the caller is free to consume
    /// `response` immediately. Failures are only logged.
    fn put_in_background(&self, request: Request, response: &Response) {
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED || status == StatusCode::PARTIAL_CONTENT {
            debug!(url = %request.url(), status = status.as_u16(), "partial response, not caching");
            return;
        }

        let copy = match response.try_clone() {
            Ok(copy) => copy,
            Err(e) => {
                warn!(url = %request.url(), error = %e, "response not cacheable");
                return;
            }
        };

        let storage = Arc::clone(&self.storage);
        let namespace = Arc::clone(&self.namespace);
        tokio::spawn(async move {
            let url = request.url().clone();
            let result = match storage.open(&namespace).await {
                Ok(cache) => cache.put(request, copy).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => info!(url = %url, namespace = %namespace, "cached"),
                Err(e) => warn!(url = %url, error = %e, "background cache write failed"),
            }
        });
    }
}

/// Network-first: fetch, mirror into the cache, fall back to the cache on failure.
///
/// Used for documents that must be as fresh as possible but should still load
/// offline.
#[derive(Clone)]
pub struct NetworkFirst {
    fetcher: Arc<dyn Fetch>,
    store: NamespacedStore,
}

impl NetworkFirst {
    pub(crate) fn new(fetcher: Arc<dyn Fetch>, store: NamespacedStore) -> Self {
        Self { fetcher, store }
    }

    /// Answer `request` network-first.
    ///
    /// # Errors
    ///
    /// [`InterceptError::NoCachedResponse`] when the fetch fails and the cache
    /// holds nothing (or cannot be read) for `request`.
    pub async fn handle(&self, request: Request) -> Result<Response, InterceptError> {
        match self.fetcher.fetch(&unconditional(&request)).await {
            Ok(response) => {
                self.store.put_in_background(request, &response);
                Ok(response)
            }
            Err(error) => {
                warn!(url = %request.url(), error = %error, "network failed, falling back to cache");
                match self.store.lookup(&request).await {
                    Some(cached) => {
                        debug!(url = %request.url(), "served from cache");
                        Ok(cached)
                    }
                    None => Err(InterceptError::NoCachedResponse {
                        url: request.url().to_string(),
                        source: error,
                    }),
                }
            }
        }
    }
}

/// Cache-first: serve the cached copy; on a miss, fetch and cache it.
///
/// Hits are authoritative and never revalidated, which suits immutable,
/// content-addressed static assets.
#[derive(Clone)]
pub struct CacheFirst {
    fetcher: Arc<dyn Fetch>,
    store: NamespacedStore,
}

impl CacheFirst {
    pub(crate) fn new(fetcher: Arc<dyn Fetch>, store: NamespacedStore) -> Self {
        Self { fetcher, store }
    }

    /// Answer `request` cache-first.
    ///
    /// # Errors
    ///
    /// [`InterceptError::NetworkUnavailable`] on a cache miss whose fetch fails.
    pub async fn handle(&self, request: Request) -> Result<Response, InterceptError> {
        if let Some(cached) = self.store.lookup(&request).await {
            debug!(url = %request.url(), "cache hit");
            return Ok(cached);
        }

        debug!(url = %request.url(), "cache miss");
        match self.fetcher.fetch(&unconditional(&request)).await {
            Ok(response) => {
                self.store.put_in_background(request, &response);
                Ok(response)
            }
            Err(error) => Err(InterceptError::NetworkUnavailable {
                url: request.url().to_string(),
                source: error,
            }),
        }
    }
}
