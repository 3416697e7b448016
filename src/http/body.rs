//! Single-consumption response bodies.
//!
//! A [`Body`] can be read exactly once. Code that needs to both hand a body to
//! a caller and keep it (for example to store it in a cache) must duplicate it
//! with [`Body::try_clone`] *before* the first read.

use bytes::Bytes;
use thiserror::Error;

/// Errors raised when a body is used after it has been consumed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("body has already been consumed")]
    AlreadyConsumed,
}

/// A response body that can be consumed once.
///
/// # Examples
///
/// ```
/// use stowaway::http::{Body, BodyError};
///
/// let mut body = Body::from("hello");
/// let mut copy = body.try_clone().unwrap();
///
/// assert_eq!(body.take().unwrap(), "hello");
/// assert_eq!(body.take(), Err(BodyError::AlreadyConsumed));
/// assert!(body.try_clone().is_err());
/// assert_eq!(copy.take().unwrap(), "hello");
/// ```
#[derive(Debug)]
pub struct Body {
    // `None` once consumed.
    inner: Option<Bytes>,
}

impl Body {
    /// Creates an empty, unconsumed body.
    pub fn empty() -> Self {
        Self {
            inner: Some(Bytes::new()),
        }
    }

    /// Returns `true` once [`take`](Self::take) has been called.
    pub fn is_consumed(&self) -> bool {
        self.inner.is_none()
    }

    /// Returns the body length, or `None` if it has been consumed.
    pub fn len(&self) -> Option<usize> {
        self.inner.as_ref().map(Bytes::len)
    }

    /// Returns an independent copy of this body.
    ///
    /// # Errors
    ///
    /// [`BodyError::AlreadyConsumed`] if the body has been read.
    pub fn try_clone(&self) -> Result<Self, BodyError> {
        match &self.inner {
            // `Bytes` clones share the allocation; each copy is still consumed independently.
            Some(bytes) => Ok(Self {
                inner: Some(bytes.clone()),
            }),
            None => Err(BodyError::AlreadyConsumed),
        }
    }

    /// Consumes the body, returning its bytes.
    ///
    /// # Errors
    ///
    /// [`BodyError::AlreadyConsumed`] on every call after the first.
    pub fn take(&mut self) -> Result<Bytes, BodyError> {
        self.inner.take().ok_or(BodyError::AlreadyConsumed)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self { inner: Some(bytes) }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Bytes::from(text).into()
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Bytes::from_static(text.as_bytes()).into()
    }
}
