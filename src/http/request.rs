//! Intercepted requests and their cache identity.
//!
//! Inbound HTTP/1.1 requests are parsed with the [`httparse`] crate and
//! resolved to an absolute [`Url`], which together with the method forms the
//! request's identity in the cache.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use url::Url;

use super::{Headers, Method};

/// Errors that can occur while parsing or constructing a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request URL has no host: {url}")]
    MissingHost { url: String },
}

/// The identity under which a request's response is cached.
///
/// Two requests with the same method and absolute URL (fragment excluded)
/// address the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    url: String,
}

impl CacheKey {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An intercepted request.
///
/// Immutable once created; clones share their state, so a request can be used
/// as the network argument and as a cache key at the same time.
///
/// # Examples
///
/// ```
/// use stowaway::http::Request;
///
/// let raw = b"GET /app.js?v=3 HTTP/1.1\r\nHost: localhost:8080\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/app.js");
/// assert_eq!(request.url().as_str(), "http://localhost:8080/app.js?v=3");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    method: Method,
    url: Url,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Creates a `GET` request for an absolute URL.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidUrl`] — `url` is not a valid absolute URL.
    /// - [`RequestError::MissingHost`] — `url` has no host component.
    pub fn get(url: &str) -> Result<Self, RequestError> {
        Self::new(Method::Get, Url::parse(url)?, Headers::new())
    }

    /// Creates a body-less request from its parts.
    ///
    /// # Errors
    ///
    /// [`RequestError::MissingHost`] if `url` has no host component.
    pub fn new(method: Method, mut url: Url, headers: Headers) -> Result<Self, RequestError> {
        if url.host_str().is_none() {
            return Err(RequestError::MissingHost { url: url.into() });
        }
        url.set_fragment(None);
        Ok(Self {
            inner: Arc::new(Inner {
                method,
                url,
                version: 1,
                headers,
                body: Bytes::new(),
            }),
        })
    }

    /// Returns a copy of this request with every header named in `names` removed.
    ///
    /// Method, URL and body are shared with the original, so the copy keeps
    /// the same [`CacheKey`].
    pub fn without_headers(&self, names: &[&str]) -> Self {
        let mut headers = self.inner.headers.clone();
        for name in names {
            headers.remove(name);
        }
        Self {
            inner: Arc::new(Inner {
                method: self.inner.method.clone(),
                url: self.inner.url.clone(),
                version: self.inner.version,
                headers,
                body: self.inner.body.clone(),
            }),
        }
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Both origin-form targets (`GET /app.js` with a `Host` header) and
    /// absolute-form targets (`GET http://host/app.js`, as sent to a proxy)
    /// are accepted. Origin-form targets are resolved against `http://{Host}`.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf`. The body is capped at `Content-Length` (empty when absent), so
    /// bytes of a pipelined follow-up request never leak into it.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — method, path, version or `Host` is absent.
    /// - [`RequestError::InvalidUrl`] — the target does not form a valid URL.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(m) => m.parse().unwrap_or_else(|never| match never {}),
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let mut url = if target.starts_with('/') {
            let host = header_map
                .get("host")
                .ok_or(RequestError::MissingField { field: "host" })?;
            Url::parse(&format!("http://{host}{target}"))?
        } else {
            Url::parse(target)?
        };
        if url.host_str().is_none() {
            return Err(RequestError::MissingHost { url: url.into() });
        }
        url.set_fragment(None);

        // Without `Content-Length` a request has no body; anything after the
        // head belongs to the next pipelined request.
        let content_length = header_map
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_end = buf.len().min(body_offset.saturating_add(content_length));
        let body = Bytes::copy_from_slice(&buf[body_offset..body_end]);

        Ok((
            Self {
                inner: Arc::new(Inner {
                    method,
                    url,
                    version,
                    headers: header_map,
                    body,
                }),
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Returns the absolute request URL.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the URL path, without query string.
    pub fn path(&self) -> &str {
        self.inner.url.path()
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.inner.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// Returns the key this request is stored under in a cache.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            method: self.inner.method.clone(),
            url: self.inner.url.as_str().to_owned(),
        }
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.inner.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.inner.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.inner.headers.get("content-length")?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origin_form_uses_host() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.url().as_str(), "http://localhost/");
        assert_eq!(req.version(), 1);
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn parse_absolute_form() {
        let raw = b"GET http://cdn.example.com:8081/pkg/app_bg.wasm HTTP/1.1\r\nHost: ignored\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.url().host_str(), Some("cdn.example.com"));
        assert_eq!(req.url().port(), Some(8081));
        assert_eq!(req.path(), "/pkg/app_bg.wasm");
    }

    #[test]
    fn origin_form_without_host_is_rejected() {
        let raw = b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::MissingField { field: "host" })
        ));
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn path_excludes_query_but_key_includes_it() {
        let req = Request::get("http://localhost/style.css?v=2").unwrap();
        assert_eq!(req.path(), "/style.css");
        assert_eq!(req.cache_key().url(), "http://localhost/style.css?v=2");
    }

    #[test]
    fn fragment_is_not_part_of_identity() {
        let a = Request::get("http://localhost/index.html#top").unwrap();
        let b = Request::get("http://localhost/index.html").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn url_without_host_is_rejected() {
        assert!(matches!(
            Request::get("data:text/plain,hello"),
            Err(RequestError::MissingHost { .. })
        ));
    }

    #[test]
    fn keep_alive_rules() {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());
        let (req, _) =
            Request::parse(b"GET / HTTP/1.1\r\nHost: a\r\nConnection: close\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.0\r\nHost: a\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn content_length() {
        let raw = b"POST /submit HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(&raw[body_offset..], b"hello");
        assert_eq!(req.body().as_ref(), b"hello");
    }

    #[test]
    fn pipelined_request_does_not_leak_into_body() {
        let raw = b"GET /a.js HTTP/1.1\r\nHost: x\r\n\r\nGET /b.js HTTP/1.1\r\nHost: x\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/a.js");
        assert!(req.body().is_empty());

        let (next, _) = Request::parse(&raw[offset..]).unwrap();
        assert_eq!(next.path(), "/b.js");
    }

    #[test]
    fn body_stops_at_content_length() {
        let raw = b"POST /submit HTTP/1.1\r\nHost: x\r\nContent-Length: 2\r\n\r\nokGET / HTTP/1.1\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.body().as_ref(), b"ok");
    }

    #[test]
    fn without_headers_keeps_identity() {
        let mut headers = Headers::new();
        headers.insert("If-None-Match", "\"abc\"");
        headers.insert("Accept", "*/*");
        let url = Url::parse("http://localhost/app.js").unwrap();
        let req = Request::new(Method::Get, url, headers).unwrap();

        let stripped = req.without_headers(&["if-none-match"]);
        assert!(!stripped.headers().contains("if-none-match"));
        assert_eq!(stripped.headers().get("accept"), Some("*/*"));
        assert_eq!(stripped.cache_key(), req.cache_key());
        assert!(req.headers().contains("if-none-match"));
    }
}
