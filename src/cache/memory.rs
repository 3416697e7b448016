//! In-process cache storage backed by `tokio::sync::RwLock`-guarded maps.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use super::{Cache, CacheError, CacheStorage};
use crate::BoxFuture;
use crate::http::request::CacheKey;
use crate::http::{Headers, Request, Response, StatusCode};

/// A response as held by the store: fully buffered and re-readable.
#[derive(Debug, Clone)]
struct StoredResponse {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

/// An in-memory [`CacheStorage`].
///
/// Namespaces are created lazily on first [`open`](CacheStorage::open) and
/// live as long as the storage. Cloning a `MemoryStorage` shares its state.
///
/// # Examples
///
/// ```
/// use stowaway::cache::{Cache, CacheStorage, MemoryStorage};
/// use stowaway::http::{Request, Response, StatusCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = MemoryStorage::new();
/// let cache = storage.open("v1").await?;
/// let request = Request::get("http://localhost/app.js")?;
///
/// cache.put(request.clone(), Response::new(StatusCode::OK).body("JS-v1")).await?;
/// let mut hit = cache.get(&request).await?.expect("entry was just stored");
/// assert_eq!(hit.text()?, "JS-v1");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    namespaces: Arc<RwLock<HashMap<String, Arc<MemoryCache>>>>,
}

impl MemoryStorage {
    /// Creates storage with no namespaces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the concrete cache for `namespace`, creating it if needed.
    pub async fn namespace(&self, namespace: &str) -> Arc<MemoryCache> {
        if let Some(cache) = self.namespaces.read().await.get(namespace) {
            return Arc::clone(cache);
        }
        let mut namespaces = self.namespaces.write().await;
        Arc::clone(namespaces.entry(namespace.to_owned()).or_default())
    }

    /// Returns the names of all namespaces opened so far, sorted.
    pub async fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<_> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl CacheStorage for MemoryStorage {
    fn open<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<Arc<dyn Cache>, CacheError>> {
        Box::pin(async move {
            let cache: Arc<dyn Cache> = self.namespace(namespace).await;
            Ok(cache)
        })
    }
}

/// A single in-memory cache namespace.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, StoredResponse>>,
}

impl MemoryCache {
    /// Returns the number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Returns `true` if an entry exists for `request`.
    pub async fn contains(&self, request: &Request) -> bool {
        self.entries
            .read()
            .await
            .contains_key(&request.cache_key())
    }
}

impl Cache for MemoryCache {
    fn get<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Option<Response>, CacheError>> {
        Box::pin(async move {
            let entries = self.entries.read().await;
            Ok(entries.get(&request.cache_key()).map(|stored| {
                Response::from_parts(stored.status, stored.headers.clone(), stored.body.clone())
            }))
        })
    }

    fn put(&self, request: Request, response: Response) -> BoxFuture<'_, Result<(), CacheError>> {
        Box::pin(async move {
            let (status, headers, mut body) = response.into_parts();
            let stored = StoredResponse {
                status,
                headers,
                body: body.take()?,
            };
            self.entries
                .write()
                .await
                .insert(request.cache_key(), stored);
            Ok(())
        })
    }
}
