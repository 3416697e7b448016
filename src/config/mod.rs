//! Static policy configuration, loaded once at start-up.
//!
//! ```json
//! {
//!   "always_fresh_paths": ["/", "/index.html", "/service-worker.js"],
//!   "cache_first_extensions": [".js", ".css", ".wasm"],
//!   "namespace": "v1",
//!   "fetch_timeout_ms": 10000
//! }
//! ```
//!
//! Every field is optional; omitted fields take the defaults shown above
//! (except `fetch_timeout_ms`, which defaults to no timeout).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a [`PolicyConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache namespace must not be empty")]
    EmptyNamespace,
}

/// Which requests are intercepted and how.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Paths that always try the network first.
    pub always_fresh_paths: Vec<String>,
    /// Path suffixes served cache-first.
    pub cache_first_extensions: Vec<String>,
    /// Cache namespace every entry is stored in.
    pub namespace: String,
    /// Upper bound on a single network fetch, in milliseconds.
    pub fetch_timeout_ms: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            always_fresh_paths: ["/", "/index.html", "/service-worker.js"]
                .map(String::from)
                .to_vec(),
            cache_first_extensions: [".js", ".css", ".wasm"].map(String::from).to_vec(),
            namespace: "v1".to_owned(),
            fetch_timeout_ms: None,
        }
    }
}

impl PolicyConfig {
    /// Parses a config from JSON text.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Json`] — malformed JSON or unknown fields.
    /// - [`ConfigError::EmptyNamespace`] — `namespace` is blank.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Returns the fetch timeout, if one is configured.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        Ok(())
    }
}
