//! Interception policy — classify each request and answer it network-first or cache-first.
//!
//! ## Core types
//!
//! - [`Interceptor`] — the single-method interface a dispatcher calls per request.
//! - [`InterceptionPolicy`] — the [`Interceptor`] built from a [`PolicyConfig`].
//! - [`Classifier`] / [`Strategy`] — the pure request → strategy mapping.
//! - [`NetworkFirst`] / [`CacheFirst`] — the two strategy pipelines.
//!
//! Each intercepted request runs as its own future; the only state shared
//! between requests is the cache store. Cache writes happen on detached tasks
//! and are never awaited by the request that triggered them, so a write from
//! one request may become visible to a concurrent lookup at any point.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::BoxFuture;
use crate::cache::CacheStorage;
use crate::config::PolicyConfig;
use crate::fetch::{Fetch, FetchError};
use crate::http::{Request, Response};

mod classifier;
mod strategy;

pub use classifier::{Classifier, Strategy};
pub use strategy::{CacheFirst, NetworkFirst};

use strategy::NamespacedStore;

/// Why an intercepted request produced no response.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// Cache-first miss whose network fetch failed.
    #[error("{url}: not cached and network unavailable: {source}")]
    NetworkUnavailable {
        url: String,
        #[source]
        source: FetchError,
    },

    /// Network-first fetch failed and the cache had nothing to fall back to.
    #[error("{url}: network unavailable and no cached response: {source}")]
    NoCachedResponse {
        url: String,
        #[source]
        source: FetchError,
    },
}

/// The eventual answer to an intercepted request.
pub type ResponseFuture = BoxFuture<'static, Result<Response, InterceptError>>;

/// Decides, per request, whether to answer it.
///
/// Returning `None` declines the request: the dispatcher applies its default
/// network behavior. Returning `Some` commits to exactly one answer, which may
/// still be an error.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: Request) -> Option<ResponseFuture>;
}

/// The configured [`Interceptor`]: a [`Classifier`] in front of both strategies.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stowaway::{HttpFetcher, InterceptionPolicy, Interceptor, MemoryStorage, PolicyConfig, Request};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let policy = InterceptionPolicy::new(
///     &PolicyConfig::default(),
///     Arc::new(HttpFetcher::new()),
///     Arc::new(MemoryStorage::new()),
/// );
///
/// let request = Request::get("http://localhost:8080/app.js")?;
/// if let Some(answer) = policy.intercept(request) {
///     let response = answer.await?;
///     println!("{}", response.status());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InterceptionPolicy {
    classifier: Arc<Classifier>,
    network_first: NetworkFirst,
    cache_first: CacheFirst,
}

impl InterceptionPolicy {
    pub fn new(
        config: &PolicyConfig,
        fetcher: Arc<dyn Fetch>,
        storage: Arc<dyn CacheStorage>,
    ) -> Self {
        let store = NamespacedStore::new(storage, &config.namespace);
        Self {
            classifier: Arc::new(Classifier::from_config(config)),
            network_first: NetworkFirst::new(Arc::clone(&fetcher), store.clone()),
            cache_first: CacheFirst::new(fetcher, store),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

impl Interceptor for InterceptionPolicy {
    fn intercept(&self, request: Request) -> Option<ResponseFuture> {
        let Some(strategy) = self.classifier.classify(&request) else {
            debug!(method = %request.method(), url = %request.url(), "not intercepted");
            return None;
        };
        debug!(url = %request.url(), strategy = %strategy, "intercepted");

        Some(match strategy {
            Strategy::NetworkFirst => {
                let network_first = self.network_first.clone();
                Box::pin(async move { network_first.handle(request).await })
            }
            Strategy::CacheFirst => {
                let cache_first = self.cache_first.clone();
                Box::pin(async move { cache_first.handle(request).await })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::{Cache, CacheError, MemoryStorage};
    use crate::http::{Headers, Method, StatusCode};

    /// A network whose reachability and content are switched by the test.
    ///
    /// Like a real origin it answers `304` with no body to any request that
    /// carries `If-None-Match`.
    #[derive(Default)]
    struct FakeNetwork {
        // `None` means offline.
        body: Mutex<Option<String>>,
        // Overrides the `200` status of unconditional answers.
        status: Mutex<Option<StatusCode>>,
        calls: AtomicUsize,
        conditional_calls: AtomicUsize,
    }

    impl FakeNetwork {
        fn online(body: &str) -> Arc<Self> {
            let net = Arc::new(Self::default());
            net.serve(body);
            net
        }

        fn offline() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn serve(&self, body: &str) {
            *self.body.lock().unwrap() = Some(body.to_owned());
        }

        fn go_offline(&self) {
            *self.body.lock().unwrap() = None;
        }

        fn answer_with(&self, status: StatusCode) {
            *self.status.lock().unwrap() = Some(status);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn conditional_calls(&self) -> usize {
            self.conditional_calls.load(Ordering::SeqCst)
        }
    }

    impl Fetch for FakeNetwork {
        fn fetch<'a>(
            &'a self,
            request: &'a Request,
        ) -> BoxFuture<'a, Result<Response, FetchError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let conditional = request.headers().contains("if-none-match");
            if conditional {
                self.conditional_calls.fetch_add(1, Ordering::SeqCst);
            }
            let body = self.body.lock().unwrap().clone();
            let status = self.status.lock().unwrap().unwrap_or(StatusCode::OK);
            Box::pin(async move {
                match body {
                    Some(_) if conditional => Ok(Response::new(StatusCode::NOT_MODIFIED)),
                    Some(body) => Ok(Response::new(status).body(body)),
                    None => Err(FetchError::Unavailable("offline".to_owned())),
                }
            })
        }
    }

    /// Storage that can never be opened.
    struct BrokenStorage;

    impl CacheStorage for BrokenStorage {
        fn open<'a>(
            &'a self,
            namespace: &'a str,
        ) -> BoxFuture<'a, Result<Arc<dyn Cache>, CacheError>> {
            Box::pin(async move {
                Err(CacheError::Unavailable {
                    namespace: namespace.to_owned(),
                    reason: "quota exceeded".to_owned(),
                })
            })
        }
    }

    fn config() -> PolicyConfig {
        PolicyConfig {
            always_fresh_paths: vec!["/".into(), "/index.html".into()],
            ..PolicyConfig::default()
        }
    }

    fn policy(net: &Arc<FakeNetwork>, storage: &MemoryStorage) -> InterceptionPolicy {
        InterceptionPolicy::new(&config(), net.clone(), Arc::new(storage.clone()))
    }

    fn get(path: &str) -> Request {
        Request::get(&format!("http://localhost:8080{path}")).unwrap()
    }

    fn conditional_get(path: &str) -> Request {
        let mut headers = Headers::new();
        headers.insert("If-None-Match", "\"client-etag\"");
        let url = url::Url::parse(&format!("http://localhost:8080{path}")).unwrap();
        Request::new(Method::Get, url, headers).unwrap()
    }

    /// Gives detached background writes a chance to run.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn run(policy: &InterceptionPolicy, path: &str) -> Result<Response, InterceptError> {
        policy
            .intercept(get(path))
            .expect("request should be intercepted")
            .await
    }

    /// Yields to the runtime until a background write has landed.
    async fn cached_text(storage: &MemoryStorage, path: &str, expected: &str) -> String {
        let request = get(path);
        let mut last = None;
        for _ in 0..100 {
            let cache = storage.namespace("v1").await;
            if let Some(mut hit) = cache.get(&request).await.unwrap() {
                let text = hit.text().unwrap();
                if text == expected {
                    return text;
                }
                last = Some(text);
            }
            tokio::task::yield_now().await;
        }
        panic!("{path} never cached as {expected:?} (last seen {last:?})");
    }

    // ── Classification ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn unclassified_requests_are_declined() {
        let net = FakeNetwork::online("data");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        assert!(policy.intercept(get("/api/recipes")).is_none());
        assert!(policy.intercept(get("/favicon.ico")).is_none());
        assert_eq!(net.calls(), 0);
    }

    #[tokio::test]
    async fn non_get_requests_are_declined() {
        let net = FakeNetwork::online("data");
        let policy = policy(&net, &MemoryStorage::new());
        let url = url::Url::parse("http://localhost:8080/app.js").unwrap();
        let post = Request::new(Method::Post, url, Headers::new()).unwrap();
        assert!(policy.intercept(post).is_none());
    }

    // ── Network-first ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn network_first_returns_network_body_and_caches_it() {
        let net = FakeNetwork::online("HTML-v1");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let mut response = run(&policy, "/").await.unwrap();
        assert_eq!(response.bytes().unwrap().as_ref(), b"HTML-v1");
        assert_eq!(cached_text(&storage, "/", "HTML-v1").await, "HTML-v1");
        assert_eq!(net.calls(), 1);
    }

    #[tokio::test]
    async fn network_first_falls_back_to_cache_when_offline() {
        let net = FakeNetwork::online("HTML-v1");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        run(&policy, "/").await.unwrap();
        cached_text(&storage, "/", "HTML-v1").await;

        net.go_offline();
        let mut response = run(&policy, "/").await.unwrap();
        assert_eq!(response.text().unwrap(), "HTML-v1");
        assert_eq!(net.calls(), 2);
    }

    #[tokio::test]
    async fn network_first_fails_when_offline_and_uncached() {
        let net = FakeNetwork::offline();
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let err = run(&policy, "/index.html").await.unwrap_err();
        assert!(matches!(err, InterceptError::NoCachedResponse { .. }));
        assert!(storage.namespace("v1").await.is_empty().await);
    }

    #[tokio::test]
    async fn network_first_last_write_wins() {
        let net = FakeNetwork::online("HTML-v1");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let mut first = run(&policy, "/").await.unwrap();
        cached_text(&storage, "/", "HTML-v1").await;

        net.serve("HTML-v2");
        let mut second = run(&policy, "/").await.unwrap();

        assert_eq!(first.text().unwrap(), "HTML-v1");
        assert_eq!(second.text().unwrap(), "HTML-v2");
        assert_eq!(cached_text(&storage, "/", "HTML-v2").await, "HTML-v2");
        assert_eq!(storage.namespace("v1").await.len().await, 1);
    }

    #[tokio::test]
    async fn network_first_survives_broken_store() {
        let net = FakeNetwork::online("HTML-v1");
        let policy = InterceptionPolicy::new(&config(), net.clone(), Arc::new(BrokenStorage));

        let mut response = run(&policy, "/").await.unwrap();
        assert_eq!(response.text().unwrap(), "HTML-v1");
        // let the doomed background write run; it must not panic or surface
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn network_first_broken_store_while_offline_fails() {
        let net = FakeNetwork::offline();
        let policy = InterceptionPolicy::new(&config(), net.clone(), Arc::new(BrokenStorage));

        let err = run(&policy, "/").await.unwrap_err();
        assert!(matches!(err, InterceptError::NoCachedResponse { .. }));
    }

    // ── Cache-first ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn cache_first_miss_fetches_once_and_caches() {
        let net = FakeNetwork::online("JS-v1");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let mut response = run(&policy, "/app.js").await.unwrap();
        assert_eq!(response.text().unwrap(), "JS-v1");
        assert_eq!(net.calls(), 1);
        assert_eq!(cached_text(&storage, "/app.js", "JS-v1").await, "JS-v1");
    }

    #[tokio::test]
    async fn cache_first_hit_skips_network() {
        let net = FakeNetwork::online("JS-v1");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        run(&policy, "/app.js").await.unwrap();
        cached_text(&storage, "/app.js", "JS-v1").await;

        // a changed upstream is not observed: hits are authoritative
        net.serve("JS-v2");
        let mut response = run(&policy, "/app.js").await.unwrap();
        assert_eq!(response.text().unwrap(), "JS-v1");
        assert_eq!(net.calls(), 1);
    }

    #[tokio::test]
    async fn cache_first_hit_works_offline() {
        let net = FakeNetwork::offline();
        let storage = MemoryStorage::new();
        storage
            .namespace("v1")
            .await
            .put(get("/style.css"), Response::new(StatusCode::OK).body("a{}"))
            .await
            .unwrap();
        let policy = policy(&net, &storage);

        let mut response = run(&policy, "/style.css").await.unwrap();
        assert_eq!(response.text().unwrap(), "a{}");
        assert_eq!(net.calls(), 0);
    }

    #[tokio::test]
    async fn cache_first_miss_while_offline_fails() {
        let net = FakeNetwork::offline();
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let err = run(&policy, "/pkg/app_bg.wasm").await.unwrap_err();
        assert!(matches!(err, InterceptError::NetworkUnavailable { .. }));
        assert_eq!(net.calls(), 1);
        tokio::task::yield_now().await;
        assert!(storage.namespace("v1").await.is_empty().await);
    }

    #[tokio::test]
    async fn cache_first_broken_store_goes_to_network() {
        let net = FakeNetwork::online("JS-v1");
        let policy = InterceptionPolicy::new(&config(), net.clone(), Arc::new(BrokenStorage));

        let mut response = run(&policy, "/app.js").await.unwrap();
        assert_eq!(response.text().unwrap(), "JS-v1");
        assert_eq!(net.calls(), 1);
    }

    #[tokio::test]
    async fn entries_land_in_configured_namespace() {
        let net = FakeNetwork::online("JS-v1");
        let storage = MemoryStorage::new();
        let config = PolicyConfig {
            namespace: "assets".into(),
            ..PolicyConfig::default()
        };
        let policy = InterceptionPolicy::new(&config, net.clone(), Arc::new(storage.clone()));

        run(&policy, "/app.js").await.unwrap();
        for _ in 0..100 {
            if storage.namespace("assets").await.contains(&get("/app.js")).await {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(storage.namespace("assets").await.contains(&get("/app.js")).await);
        assert!(storage.namespace("v1").await.is_empty().await);
    }

    // ── Conditional and partial responses ─────────────────────────────────────

    #[tokio::test]
    async fn network_first_fetches_full_body_for_conditional_request() {
        let net = FakeNetwork::online("HTML-v1");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let mut response = policy
            .intercept(conditional_get("/"))
            .expect("entry document is intercepted")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().unwrap(), "HTML-v1");
        assert_eq!(net.conditional_calls(), 0);
        assert_eq!(cached_text(&storage, "/", "HTML-v1").await, "HTML-v1");

        net.go_offline();
        let mut offline = run(&policy, "/").await.unwrap();
        assert_eq!(offline.text().unwrap(), "HTML-v1");
    }

    #[tokio::test]
    async fn cache_first_miss_fetches_full_body_for_conditional_request() {
        let net = FakeNetwork::online("JS-v1");
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let mut response = policy
            .intercept(conditional_get("/app.js"))
            .expect("static asset is intercepted")
            .await
            .unwrap();
        assert_eq!(response.text().unwrap(), "JS-v1");
        assert_eq!(net.conditional_calls(), 0);
        assert_eq!(cached_text(&storage, "/app.js", "JS-v1").await, "JS-v1");
    }

    #[tokio::test]
    async fn not_modified_is_passed_on_but_not_cached() {
        let net = FakeNetwork::online("");
        net.answer_with(StatusCode::NOT_MODIFIED);
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let response = run(&policy, "/").await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        settle().await;
        assert!(storage.namespace("v1").await.is_empty().await);
    }

    #[tokio::test]
    async fn partial_content_is_not_cached() {
        let net = FakeNetwork::online("JS-");
        net.answer_with(StatusCode::PARTIAL_CONTENT);
        let storage = MemoryStorage::new();
        let policy = policy(&net, &storage);

        let response = run(&policy, "/app.js").await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        settle().await;
        assert!(storage.namespace("v1").await.is_empty().await);

        // nothing was stored, so the next request goes back to the network
        run(&policy, "/app.js").await.unwrap();
        assert_eq!(net.calls(), 2);
    }
}
