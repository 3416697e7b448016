//! Request classification — which strategy, if any, answers a request.

use std::fmt;

use crate::config::PolicyConfig;
use crate::http::{Method, Request};

/// How an intercepted request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Try the network, fall back to the cache.
    NetworkFirst,
    /// Try the cache, fall back to the network.
    CacheFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NetworkFirst => "network-first",
            Self::CacheFirst => "cache-first",
        })
    }
}

/// Maps requests to a [`Strategy`] by URL path.
///
/// Rules, in precedence order:
///
/// 1. path equals an always-fresh path → [`Strategy::NetworkFirst`];
/// 2. path ends with a cache-first extension → [`Strategy::CacheFirst`];
/// 3. otherwise the request is not intercepted.
///
/// Only `GET` requests are classified. The two sets are expected to be
/// disjoint; overlap is resolved by rule order and not reported.
///
/// # Examples
///
/// ```
/// use stowaway::{Classifier, PolicyConfig, Strategy};
///
/// let classifier = Classifier::from_config(&PolicyConfig::default());
/// assert_eq!(classifier.classify_path("/index.html"), Some(Strategy::NetworkFirst));
/// assert_eq!(classifier.classify_path("/pkg/app_bg.wasm"), Some(Strategy::CacheFirst));
/// assert_eq!(classifier.classify_path("/api/recipes"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    always_fresh_paths: Vec<String>,
    cache_first_extensions: Vec<String>,
}

impl Classifier {
    pub fn new(
        always_fresh_paths: impl IntoIterator<Item = impl Into<String>>,
        cache_first_extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            always_fresh_paths: always_fresh_paths.into_iter().map(Into::into).collect(),
            cache_first_extensions: cache_first_extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(
            config.always_fresh_paths.iter().cloned(),
            config.cache_first_extensions.iter().cloned(),
        )
    }

    /// Classify `request`, or return `None` to leave it unintercepted.
    pub fn classify(&self, request: &Request) -> Option<Strategy> {
        if request.method() != &Method::Get {
            return None;
        }
        self.classify_path(request.path())
    }

    /// Classify a bare URL path (no query string).
    pub fn classify_path(&self, path: &str) -> Option<Strategy> {
        if self.always_fresh_paths.iter().any(|p| p == path) {
            return Some(Strategy::NetworkFirst);
        }
        if self
            .cache_first_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
        {
            return Some(Strategy::CacheFirst);
        }
        None
    }
}
