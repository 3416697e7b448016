//! HTTP/1.1 responses with a single-consumption body.
//!
//! A [`Response`] is deliberately not `Clone`: its body can be read once, so
//! a response that must be both returned to a caller and written to a cache is
//! duplicated with [`Response::try_clone`] before either use.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Body, BodyError, Headers, StatusCode};

/// An HTTP/1.1 response.
///
/// # Examples
///
/// ```
/// use stowaway::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "text/html")
///     .body("HTML-v1");
///
/// let mut stored = response.try_clone().unwrap();
/// assert_eq!(stored.text().unwrap(), "HTML-v1");
///
/// let bytes = response.into_bytes().unwrap();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.ends_with("\r\n\r\nHTML-v1"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::empty(),
            keep_alive: true,
        }
    }

    /// Assembles a response from parts, e.g. when rebuilding one from a cache entry.
    pub fn from_parts(status: StatusCode, headers: Headers, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns `true` once the body has been read.
    pub fn is_body_consumed(&self) -> bool {
        self.body.is_consumed()
    }

    /// Returns an independent copy of this response, body included.
    ///
    /// # Errors
    ///
    /// [`BodyError::AlreadyConsumed`] if the body has already been read.
    pub fn try_clone(&self) -> Result<Self, BodyError> {
        Ok(Self {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
            keep_alive: self.keep_alive,
        })
    }

    /// Consumes the body and returns its bytes.
    ///
    /// # Errors
    ///
    /// [`BodyError::AlreadyConsumed`] if the body has already been read.
    pub fn bytes(&mut self) -> Result<Bytes, BodyError> {
        self.body.take()
    }

    /// Consumes the body and returns it as (lossily decoded) UTF-8 text.
    pub fn text(&mut self) -> Result<String, BodyError> {
        let bytes = self.body.take()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Splits the response into status, headers and the still-unread body.
    pub fn into_parts(self) -> (StatusCode, Headers, Body) {
        (self.status, self.headers, self.body)
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Hop-by-hop headers and any upstream `Content-Length` are dropped and
    /// regenerated for this connection:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    ///
    /// # Errors
    ///
    /// [`BodyError::AlreadyConsumed`] if the body was read before serialization.
    pub fn into_bytes(mut self) -> Result<BytesMut, BodyError> {
        let body = self.body.take()?;
        let content_length = body.len();

        let mut headers = self.headers.end_to_end();
        if !body.is_empty() && !headers.contains("content-type") {
            headers.insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        headers.insert("Connection", connection);

        let estimated_size = 128 + headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(body);

        Ok(buf)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}
