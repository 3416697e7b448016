//! Offline-first forward proxy.
//!
//! ```text
//! cargo run --example proxy -- [config.json]
//! curl -x http://127.0.0.1:3128 http://localhost:8080/
//! ```
//!
//! The listen address defaults to `127.0.0.1:3128` and can be overridden with
//! `STOWAWAY_ADDR`. Log verbosity follows `RUST_LOG` (default `info`).

use std::sync::Arc;

use stowaway::{HttpFetcher, InterceptionPolicy, MemoryStorage, PolicyConfig, Proxy, Server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PolicyConfig::from_path(path)?,
        None => PolicyConfig::default(),
    };
    tracing::info!(
        fresh = ?config.always_fresh_paths,
        cache_first = ?config.cache_first_extensions,
        namespace = %config.namespace,
        "policy loaded"
    );

    let mut fetcher = HttpFetcher::new();
    if let Some(timeout) = config.fetch_timeout() {
        fetcher = fetcher.with_timeout(timeout);
    }
    let fetcher = Arc::new(fetcher);

    let policy = InterceptionPolicy::new(&config, fetcher.clone(), Arc::new(MemoryStorage::new()));
    let proxy = Arc::new(Proxy::new(policy, fetcher));

    let addr = std::env::var("STOWAWAY_ADDR").unwrap_or_else(|_| "127.0.0.1:3128".to_owned());
    let server = Server::bind(&addr).await?;

    server
        .run_until(
            move |req| {
                let proxy = Arc::clone(&proxy);
                async move { proxy.handle(req).await }
            },
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
        )
        .await?;
    Ok(())
}
