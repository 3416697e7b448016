//! HTTP header map with case-insensitive name lookup.

use std::fmt;

/// Connection-scoped headers that must not be forwarded between hops (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name.
///
/// # Examples
///
/// ```
/// use stowaway::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/wasm");
/// headers.insert("Connection", "keep-alive");
///
/// assert_eq!(headers.get("content-type"), Some("application/wasm"));
/// let forwarded = headers.end_to_end();
/// assert!(!forwarded.contains("connection"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes all entries with the given header name (case-insensitive).
    ///
    /// Returns `true` if any entries were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.inner.len();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.inner.len() < before
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a copy without hop-by-hop headers, `Host` and `Content-Length`.
    ///
    /// Used when re-emitting a message on a new connection, where those headers
    /// are regenerated for the new hop.
    pub fn end_to_end(&self) -> Self {
        let inner = self
            .inner
            .iter()
            .filter(|(k, _)| {
                !HOP_BY_HOP.iter().any(|h| k.eq_ignore_ascii_case(h))
                    && !k.eq_ignore_ascii_case("host")
                    && !k.eq_ignore_ascii_case("content-length")
            })
            .cloned()
            .collect();
        Self { inner }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Content-Type", "text/css");
        assert_eq!(h.get("content-type"), Some("text/css"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/css"));
    }

    #[test]
    fn multi_value() {
        let mut h = Headers::new();
        h.insert("Vary", "Accept");
        h.insert("Vary", "Accept-Encoding");
        let vals: Vec<_> = h.get_all("vary").collect();
        assert_eq!(vals, vec!["Accept", "Accept-Encoding"]);
    }

    #[test]
    fn remove() {
        let mut h = Headers::new();
        h.insert("X-Foo", "bar");
        h.insert("X-Foo", "baz");
        assert!(h.remove("x-foo"));
        assert!(h.is_empty());
        assert!(!h.remove("x-foo"));
    }

    #[test]
    fn end_to_end_strips_connection_scoped_headers() {
        let mut h = Headers::new();
        h.insert("Host", "localhost:8080");
        h.insert("Transfer-Encoding", "chunked");
        h.insert("Content-Length", "12");
        h.insert("Keep-Alive", "timeout=5");
        h.insert("ETag", "\"abc\"");
        h.insert("Cache-Control", "max-age=60");

        let forwarded = h.end_to_end();
        let names: Vec<_> = forwarded.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["ETag", "Cache-Control"]);
    }

    #[test]
    fn display_writes_wire_lines() {
        let mut h = Headers::new();
        h.insert("A", "1");
        h.insert("B", "2");
        assert_eq!(h.to_string(), "A: 1\r\nB: 2\r\n");
    }
}
