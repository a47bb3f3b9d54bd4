//! Captured outbound requests.
//!
//! A [`CapturedRequest`] is the immutable snapshot the capture layer hands to
//! the pipeline at the moment of interception. Nothing downstream can mutate
//! it: fields are private and only exposed through accessors, and every
//! life-cycle event carries a cheap clone of the same snapshot.
//!
//! # Example
//!
//! ```
//! use interpose_core::request::CapturedRequest;
//! use http::Method;
//!
//! let request = CapturedRequest::builder(Method::POST, "https://api.example.com/users")
//!     .header("content-type", "application/json")
//!     .body(r#"{"name":"ada"}"#)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(request.method(), &Method::POST);
//! assert_eq!(request.path(), "/users");
//! ```

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, Uri};
use std::fmt;
use thiserror::Error;

/// Errors raised while building a [`CapturedRequest`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Parser diagnostic
        reason: String,
    },

    /// The URL parsed but is not absolute (scheme and authority are required).
    #[error("URL must be absolute: {0}")]
    RelativeUrl(String),

    /// A header name or value was rejected.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as supplied
        name: String,
        /// Parser diagnostic
        reason: String,
    },
}

/// Immutable snapshot of an intercepted outbound request.
#[derive(Clone)]
pub struct CapturedRequest {
    method: Method,
    url: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl CapturedRequest {
    /// Create a request snapshot from already-parsed parts.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::RelativeUrl`] if `url` lacks a scheme or authority.
    pub fn new(
        method: Method,
        url: Uri,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Self, RequestError> {
        if url.scheme().is_none() || url.authority().is_none() {
            return Err(RequestError::RelativeUrl(url.to_string()));
        }

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    /// Start building a request for `method` and `url`.
    #[must_use]
    pub fn builder(method: Method, url: impl Into<String>) -> CapturedRequestBuilder {
        CapturedRequestBuilder {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute request URL.
    #[must_use]
    pub const fn url(&self) -> &Uri {
        &self.url
    }

    /// URL path component (always starts with `/`).
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Request headers in insertion order.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body, if the request carried one.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Body interpreted as UTF-8 text, if present and valid.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| std::str::from_utf8(body).ok())
    }
}

impl fmt::Debug for CapturedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedRequest")
            .field("method", &self.method)
            .field("url", &self.url.to_string())
            .field("headers", &self.headers.len())
            .field("body_len", &self.body.as_ref().map(Bytes::len))
            .finish()
    }
}

impl fmt::Display for CapturedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Builder for [`CapturedRequest`].
///
/// Parsing is deferred to [`build`](Self::build) so that header and URL
/// errors surface in one place.
#[derive(Debug, Clone)]
pub struct CapturedRequestBuilder {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl CapturedRequestBuilder {
    /// Append a header. Repeated names are kept in order.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Parse the URL and headers and produce the snapshot.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidUrl`] if the URL does not parse
    /// - [`RequestError::RelativeUrl`] if the URL is not absolute
    /// - [`RequestError::InvalidHeader`] if a header name or value is invalid
    pub fn build(self) -> Result<CapturedRequest, RequestError> {
        let url: Uri = self.url.parse().map_err(|e: http::uri::InvalidUri| {
            RequestError::InvalidUrl {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| RequestError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| RequestError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.append(header_name, header_value);
        }

        CapturedRequest::new(self.method, url, headers, self.body)
    }
}
