//! Network collaborator — the fallible, asynchronous `fetch(Request) -> Response`.
//!
//! [`Fetch`] is the seam the interception strategies call through.
//! [`HttpFetcher`] is the production implementation: a minimal plain-HTTP/1.1
//! client on top of Tokio TCP streams, parsing upstream responses with
//! [`httparse`].

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;
use url::Position;

use crate::BoxFuture;
use crate::http::{Headers, Method, Request, Response, StatusCode};

/// Errors produced while fetching a request from the network.
///
/// Every variant means "no response came back from the network"; callers
/// treat them uniformly as the network being unavailable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported URL scheme `{scheme}` (only http is supported)")]
    UnsupportedScheme { scheme: String },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed upstream response: {0}")]
    Parse(#[from] httparse::Error),

    #[error("malformed chunked response body")]
    InvalidChunk,

    #[error("upstream closed the connection before the response was complete")]
    Incomplete,

    #[error("upstream returned invalid status code {0}")]
    InvalidStatus(u16),

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("upstream response exceeds {max_bytes} bytes")]
    ResponseTooLarge { max_bytes: usize },

    #[error("network unavailable: {0}")]
    Unavailable(String),
}

/// An asynchronous network client.
///
/// Implementations must be shareable across tasks; the interception strategies
/// hold them behind an `Arc<dyn Fetch>`.
pub trait Fetch: Send + Sync {
    /// Issue `request` and resolve to the upstream response.
    ///
    /// Any response the upstream produces, whatever its status, is a success.
    /// Only the absence of a response is an error.
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>>;
}

/// Maximum number of headers accepted in an upstream response.
const MAX_HEADERS: usize = 96;

/// Initial read buffer capacity per upstream connection.
const INITIAL_BUF_SIZE: usize = 8192;

/// Default cap on a buffered upstream response, head included (32 MiB).
pub const MAX_RESPONSE_SIZE: usize = 32 * 1024 * 1024;

/// Plain-HTTP/1.1 [`Fetch`] implementation.
///
/// Opens one connection per request and sends `Connection: close`, so the
/// response is delimited by `Content-Length`, chunked encoding or EOF.
/// Responses are buffered whole; anything larger than
/// [`MAX_RESPONSE_SIZE`] (or the limit set with
/// [`with_max_response_size`](Self::with_max_response_size)) is rejected.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use stowaway::fetch::{Fetch, HttpFetcher};
/// use stowaway::http::Request;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = HttpFetcher::new().with_timeout(Duration::from_secs(10));
/// let request = Request::get("http://localhost:8080/index.html")?;
/// let mut response = fetcher.fetch(&request).await?;
/// println!("{}", response.text()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Option<Duration>,
    max_response_size: usize,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            timeout: None,
            max_response_size: MAX_RESPONSE_SIZE,
        }
    }
}

impl HttpFetcher {
    /// Creates a fetcher that imposes no timeout of its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each fetch, connect through last body byte, by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Rejects upstream responses larger than `max_bytes`, head included.
    #[must_use]
    pub fn with_max_response_size(mut self, max_bytes: usize) -> Self {
        self.max_response_size = max_bytes;
        self
    }

    async fn send(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url();
        if url.scheme() != "http" {
            return Err(FetchError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }

        let authority = authority(request);
        let port = url.port_or_known_default().unwrap_or(80);
        let host = url.host_str().unwrap_or_default();
        let addr = format!("{host}:{port}");

        debug!(url = %url, addr = %addr, "fetching from network");
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| FetchError::Connect { addr, source })?;

        stream.write_all(&encode_request(request, &authority)).await?;
        stream.flush().await?;

        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
        while stream.read_buf(&mut buf).await? != 0 {
            if buf.len() > self.max_response_size {
                return Err(FetchError::ResponseTooLarge {
                    max_bytes: self.max_response_size,
                });
            }
        }

        parse_response(&buf, request.method())
    }
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        Box::pin(async move {
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, self.send(request))
                    .await
                    .map_err(|_| FetchError::Timeout {
                        url: request.url().to_string(),
                        timeout,
                    })?,
                None => self.send(request).await,
            }
        })
    }
}

// `host[:port]` as it must appear in the `Host` header.
fn authority(request: &Request) -> String {
    let url = request.url();
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}

// Serialize the request head (and body, if any) for the upstream hop.
fn encode_request(request: &Request, authority: &str) -> Vec<u8> {
    let target = &request.url()[Position::BeforePath..Position::AfterQuery];
    let body = request.body();

    let mut out = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
        request.method(),
        target,
        authority
    );
    out.push_str(&request.headers().end_to_end().to_string());
    if !body.is_empty() {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");

    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

/// Parses a complete upstream HTTP/1.x response read up to EOF.
///
/// `method` is the method of the request that produced the response. Replies
/// to `HEAD`, and `1xx`, `204` and `304` replies, never carry a body whatever
/// their headers announce.
///
/// # Errors
///
/// - [`FetchError::Incomplete`] — the head or the declared body is truncated.
/// - [`FetchError::Parse`] — the head is malformed.
/// - [`FetchError::InvalidStatus`] — the status code is outside `100..=999`.
/// - [`FetchError::InvalidChunk`] — a chunked body is malformed.
pub fn parse_response(buf: &[u8], method: &Method) -> Result<Response, FetchError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Response::new(&mut headers);

    let body_offset = match raw.parse(buf)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Err(FetchError::Incomplete),
    };

    let code = raw.code.ok_or(FetchError::Incomplete)?;
    let status = StatusCode::from_u16(code).ok_or(FetchError::InvalidStatus(code))?;

    let mut header_map = Headers::with_capacity(raw.headers.len());
    for header in raw.headers.iter() {
        if let Ok(value) = std::str::from_utf8(header.value) {
            header_map.insert(header.name, value);
        }
    }

    let rest = &buf[body_offset..];
    let is_chunked = header_map
        .get("transfer-encoding")
        .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"));

    let bodiless = *method == Method::Head || matches!(code, 100..=199 | 204 | 304);

    let body = if bodiless {
        Bytes::new()
    } else if is_chunked {
        decode_chunked(rest)?
    } else if let Some(len) = header_map
        .get("content-length")
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        if rest.len() < len {
            return Err(FetchError::Incomplete);
        }
        Bytes::copy_from_slice(&rest[..len])
    } else {
        Bytes::copy_from_slice(rest)
    };

    Ok(Response::from_parts(status, header_map, body))
}

// Decode a `Transfer-Encoding: chunked` body. Trailers are ignored.
fn decode_chunked(mut buf: &[u8]) -> Result<Bytes, FetchError> {
    let mut out = BytesMut::new();
    loop {
        let (consumed, size) = match httparse::parse_chunk_size(buf) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Err(FetchError::Incomplete),
            Err(_) => return Err(FetchError::InvalidChunk),
        };
        buf = &buf[consumed..];

        if size == 0 {
            return Ok(out.freeze());
        }

        let size = usize::try_from(size).map_err(|_| FetchError::InvalidChunk)?;
        if buf.len() < size + 2 {
            return Err(FetchError::Incomplete);
        }
        if &buf[size..size + 2] != b"\r\n" {
            return Err(FetchError::InvalidChunk);
        }
        out.extend_from_slice(&buf[..size]);
        buf = &buf[size + 2..];
    }
}
