//! Cache store collaborator — an async key-value store of full responses.
//!
//! The interception strategies only ever talk to the store through two
//! traits, mirroring the host cache API they were designed against:
//!
//! - [`CacheStorage::open`] resolves a namespace (e.g. `"v1"`) to a handle.
//! - [`Cache::get`] / [`Cache::put`] read and overwrite entries keyed by
//!   request identity ([`CacheKey`](crate::http::request::CacheKey)).
//!
//! Stores own their entries as plain bytes; every `get` hands out a fresh
//! [`Response`] whose body is independent of any other.
//!
//! [`MemoryStorage`] is the bundled in-process implementation.

use std::sync::Arc;

use thiserror::Error;

use crate::BoxFuture;
use crate::http::{BodyError, Request, Response};

pub mod memory;

pub use memory::{MemoryCache, MemoryStorage};

/// Errors raised by a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache namespace `{namespace}` is unavailable: {reason}")]
    Unavailable { namespace: String, reason: String },

    #[error("cannot store response: {0}")]
    Body(#[from] BodyError),
}

/// A collection of named caches.
pub trait CacheStorage: Send + Sync {
    /// Open (creating on first use) the cache called `namespace`.
    fn open<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Arc<dyn Cache>, CacheError>>;
}

/// A single cache namespace mapping requests to responses.
///
/// Implementations must provide atomic per-key reads and writes; nothing
/// beyond that is assumed.
pub trait Cache: Send + Sync {
    /// Look up the response stored for `request`, if any.
    fn get<'a>(&'a self, request: &'a Request)
    -> BoxFuture<'a, Result<Option<Response>, CacheError>>;

    /// Store `response` under `request`, replacing any previous entry.
    ///
    /// The response body is consumed; callers keep their own copy via
    /// [`Response::try_clone`].
    fn put(&self, request: Request, response: Response) -> BoxFuture<'_, Result<(), CacheError>>;
}
