//! # stowaway
//!
//! An offline-first request-interception cache for HTTP clients.
//!
//! Every outgoing request is offered to an [`InterceptionPolicy`], which either
//! declines it or answers it with one of two strategies:
//!
//! - **network-first** for documents that must be fresh (`/`, `/index.html`, …):
//!   fetch, mirror the response into the cache in the background, and fall back
//!   to the cached copy when the network is down;
//! - **cache-first** for immutable static assets (`.js`, `.css`, `.wasm`, …):
//!   serve the cached copy, and only fetch (and then cache) on a miss.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stowaway::{HttpFetcher, InterceptionPolicy, MemoryStorage, PolicyConfig, Proxy, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PolicyConfig::default();
//!     let fetcher = Arc::new(HttpFetcher::new());
//!     let policy = InterceptionPolicy::new(&config, fetcher.clone(), Arc::new(MemoryStorage::new()));
//!     let proxy = Arc::new(Proxy::new(policy, fetcher));
//!
//!     let server = Server::bind("127.0.0.1:3128").await?;
//!     server.run(move |req| {
//!         let proxy = Arc::clone(&proxy);
//!         async move { proxy.handle(req).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod cache;
pub mod config;
pub mod fetch;
pub mod http;
pub mod policy;
pub mod proxy;
pub mod server;

/// A boxed, `Send` future — the return type of every collaborator trait method.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{Cache, CacheError, CacheStorage, MemoryStorage};
pub use config::{ConfigError, PolicyConfig};
pub use fetch::{Fetch, FetchError, HttpFetcher};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use policy::{
    CacheFirst, Classifier, InterceptError, InterceptionPolicy, Interceptor, NetworkFirst,
    ResponseFuture, Strategy,
};
pub use proxy::Proxy;
pub use server::{Server, ServerError};
