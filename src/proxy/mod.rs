//! Request dispatcher — offers each inbound request to an [`Interceptor`].
//!
//! Intercepted requests are answered by the policy; declined ones go straight
//! to the network. Either way a failure becomes an explicit `502 Bad Gateway`,
//! never an empty or placeholder success.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::fetch::Fetch;
use crate::http::{Request, Response, StatusCode};
use crate::policy::Interceptor;

/// Dispatches requests through an [`Interceptor`], with a plain-network fallthrough.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stowaway::{HttpFetcher, InterceptionPolicy, MemoryStorage, PolicyConfig, Proxy, Request};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Arc::new(HttpFetcher::new());
/// let policy = InterceptionPolicy::new(
///     &PolicyConfig::default(),
///     fetcher.clone(),
///     Arc::new(MemoryStorage::new()),
/// );
/// let proxy = Proxy::new(policy, fetcher);
///
/// let response = proxy.handle(Request::get("http://localhost:8080/")?).await;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
pub struct Proxy<I> {
    interceptor: I,
    fetcher: Arc<dyn Fetch>,
}

impl<I: Interceptor> Proxy<I> {
    pub fn new(interceptor: I, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            interceptor,
            fetcher,
        }
    }

    /// Produce the response for one inbound request.
    ///
    /// The returned response always has an unread body.
    pub async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let url = request.url().clone();

        let (response, intercepted) = match self.interceptor.intercept(request.clone()) {
            Some(answer) => match answer.await {
                Ok(response) => (response, true),
                Err(e) => {
                    warn!(url = %url, error = %e, "intercepted request failed");
                    (bad_gateway(&e), true)
                }
            },
            None => match self.fetcher.fetch(&request).await {
                Ok(response) => (response, false),
                Err(e) => {
                    warn!(url = %url, error = %e, "pass-through request failed");
                    (bad_gateway(&e), false)
                }
            },
        };

        info!(
            method = %method,
            url = %url,
            status = response.status().as_u16(),
            intercepted,
            elapsed = ?start.elapsed(),
            "request handled"
        );
        response
    }
}

fn bad_gateway(error: &dyn std::error::Error) -> Response {
    Response::new(StatusCode::BAD_GATEWAY)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(format!("Bad Gateway: {error}"))
}
