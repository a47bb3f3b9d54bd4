//! Request handlers: a route predicate paired with a resolver.
//!
//! Handlers are registered in an ordered sequence and the first handler
//! whose predicate accepts a request wins. The predicate is validated when
//! the handler is constructed, so a malformed pattern is a configuration
//! error at registration time and can never fail while matching.
//!
//! # Patterns
//!
//! | Pattern                        | Matches                                   |
//! |--------------------------------|-------------------------------------------|
//! | `*`                            | every URL                                 |
//! | `/users`                       | path `/users` on any origin               |
//! | `/users/*`                     | any path starting with `/users/`          |
//! | `https://api.test/users`       | that origin and path exactly              |
//! | `https://api.test/*`           | any path on that origin                   |
//!
//! Query strings never take part in matching.
//!
//! # Example
//!
//! ```
//! use interpose_core::handler::Handler;
//! use interpose_core::response::Response;
//! use http::StatusCode;
//!
//! let handler = Handler::get("/users/*", |_request| async {
//!     Ok(Some(Response::text(StatusCode::OK, "mocked")))
//! })
//! .unwrap()
//! .once();
//!
//! assert!(handler.is_once());
//! ```

use crate::request::CapturedRequest;
use crate::response::Response;
use http::{Method, Uri};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors raised while constructing a handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The URL pattern is malformed.
    #[error("Invalid URL pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern as supplied
        pattern: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Error produced by a resolver, either returned or raised as a panic.
///
/// Resolver errors are captured by the pipeline and reported through the
/// `unhandledException` event. They are never propagated as a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ResolverError {
    message: String,
    panicked: bool,
}

impl ResolverError {
    /// Create an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: false,
        }
    }

    /// Wrap any error, keeping its display text.
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(error.to_string())
    }

    /// Create an error describing a resolver panic.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            panicked: true,
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the resolver panicked rather than returning an error.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        self.panicked
    }
}

/// Boxed future returned by [`Resolver::resolve`].
///
/// - `Ok(Some(response))`: the request is mocked with `response`
/// - `Ok(None)`: the resolver declined; the request passes through
/// - `Err(error)`: the resolver failed
pub type ResolverFuture =
    Pin<Box<dyn Future<Output = Result<Option<Response>, ResolverError>> + Send>>;

/// User-supplied response-producing logic.
///
/// Implemented for every `Fn(CapturedRequest) -> impl Future` closure, so
/// most callers never implement it by hand.
///
/// # Dyn Compatibility
///
/// The method returns an explicit `Pin<Box<dyn Future>>` so handlers can
/// hold resolvers as `Arc<dyn Resolver>`.
pub trait Resolver: Send + Sync {
    /// Produce a response for `request`, decline, or fail.
    fn resolve(&self, request: CapturedRequest) -> ResolverFuture;
}

impl<F, Fut> Resolver for F
where
    F: Fn(CapturedRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
{
    fn resolve(&self, request: CapturedRequest) -> ResolverFuture {
        Box::pin(self(request))
    }
}

/// Validated URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    source: String,
    origin: Option<Origin>,
    path: PathMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Origin {
    scheme: String,
    authority: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathMatch {
    Exact(String),
    Prefix(String),
}

impl UrlPattern {
    /// Parse a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if the pattern is empty, is
    /// neither an absolute `http(s)` URL nor an absolute path, or contains a
    /// `*` anywhere but at the end.
    pub fn parse(pattern: &str) -> Result<Self, HandlerError> {
        let invalid = |reason: &str| HandlerError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        if pattern == "*" {
            return Ok(Self {
                source: pattern.to_string(),
                origin: None,
                path: PathMatch::Prefix(String::new()),
            });
        }

        let (body, is_prefix) = match pattern.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (pattern, false),
        };

        if body.contains('*') {
            return Err(invalid("wildcards are only supported at the end"));
        }

        let (origin, path) = if body.starts_with("http://") || body.starts_with("https://") {
            let uri: Uri = body
                .parse()
                .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
            let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) else {
                return Err(invalid("URL must include a host"));
            };
            let origin = Origin {
                scheme: scheme.to_ascii_lowercase(),
                authority: authority.as_str().to_ascii_lowercase(),
            };
            // `https://host*` keeps an empty path so any path on the host matches
            let path = if is_prefix && !body.ends_with('/') && uri.path() == "/" {
                String::new()
            } else {
                uri.path().to_string()
            };
            (Some(origin), path)
        } else if body.starts_with('/') {
            (None, body.to_string())
        } else {
            return Err(invalid("expected an absolute URL or a path starting with '/'"));
        };

        let path = if is_prefix {
            PathMatch::Prefix(path)
        } else {
            PathMatch::Exact(path)
        };

        Ok(Self {
            source: pattern.to_string(),
            origin,
            path,
        })
    }

    /// Whether `url` satisfies this pattern.
    #[must_use]
    pub fn matches(&self, url: &Uri) -> bool {
        if let Some(origin) = &self.origin {
            let scheme_ok = url
                .scheme_str()
                .is_some_and(|s| s.eq_ignore_ascii_case(&origin.scheme));
            let authority_ok = url
                .authority()
                .is_some_and(|a| a.as_str().eq_ignore_ascii_case(&origin.authority));
            if !(scheme_ok && authority_ok) {
                return false;
            }
        }

        match &self.path {
            PathMatch::Exact(path) => url.path() == path,
            PathMatch::Prefix(prefix) => url.path().starts_with(prefix.as_str()),
        }
    }

    /// The pattern as originally written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A route predicate paired with a resolver.
///
/// Handlers are shared as `Arc<Handler>` between the registry and in-flight
/// requests. The only interior state is the "used" flag of one-shot
/// handlers.
pub struct Handler {
    method: Option<Method>,
    pattern: UrlPattern,
    resolver: Arc<dyn Resolver>,
    once: bool,
    used: AtomicBool,
}

impl Handler {
    /// Create a handler for `method` (`None` for any method) and `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn new<F, Fut>(method: Option<Method>, pattern: &str, resolver: F) -> Result<Self, HandlerError>
    where
        F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
    {
        Self::with_resolver(method, pattern, Arc::new(resolver))
    }

    /// Create a handler around an already shared resolver.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn with_resolver(
        method: Option<Method>,
        pattern: &str,
        resolver: Arc<dyn Resolver>,
    ) -> Result<Self, HandlerError> {
        Ok(Self {
            method,
            pattern: UrlPattern::parse(pattern)?,
            resolver,
            once: false,
            used: AtomicBool::new(false),
        })
    }

    /// Handler for any method.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn any<F, Fut>(pattern: &str, resolver: F) -> Result<Self, HandlerError>
    where
        F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
    {
        Self::new(None, pattern, resolver)
    }

    /// `GET` handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn get<F, Fut>(pattern: &str, resolver: F) -> Result<Self, HandlerError>
    where
        F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
    {
        Self::new(Some(Method::GET), pattern, resolver)
    }

    /// `POST` handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn post<F, Fut>(pattern: &str, resolver: F) -> Result<Self, HandlerError>
    where
        F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
    {
        Self::new(Some(Method::POST), pattern, resolver)
    }

    /// `PUT` handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn put<F, Fut>(pattern: &str, resolver: F) -> Result<Self, HandlerError>
    where
        F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
    {
        Self::new(Some(Method::PUT), pattern, resolver)
    }

    /// `PATCH` handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn patch<F, Fut>(pattern: &str, resolver: F) -> Result<Self, HandlerError>
    where
        F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
    {
        Self::new(Some(Method::PATCH), pattern, resolver)
    }

    /// `DELETE` handler.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidPattern`] if `pattern` is malformed.
    pub fn delete<F, Fut>(pattern: &str, resolver: F) -> Result<Self, HandlerError>
    where
        F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>, ResolverError>> + Send + 'static,
    {
        Self::new(Some(Method::DELETE), pattern, resolver)
    }

    /// Respond at most once; afterwards the handler is skipped by matching.
    #[must_use]
    pub const fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Whether this is a one-shot handler.
    #[must_use]
    pub const fn is_once(&self) -> bool {
        self.once
    }

    /// Method filter, `None` meaning any method.
    #[must_use]
    pub const fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// URL pattern.
    #[must_use]
    pub const fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    /// Predicate check on `(method, url)`. Pure: never touches handler state.
    #[must_use]
    pub fn accepts(&self, method: &Method, url: &Uri) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.pattern.matches(url)
    }

    /// Whether a one-shot handler is used, or claimed by a request in flight.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.once && self.used.load(Ordering::Acquire)
    }

    /// Claim the right to respond.
    ///
    /// Always succeeds for regular handlers. A one-shot handler can be claimed
    /// by one request at a time; the claim sticks unless [`release`](Self::release)
    /// gives it back.
    #[must_use]
    pub fn try_claim(&self) -> bool {
        !self.once
            || self
                .used
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Give back a claim that did not end in a delivered mocked response.
    pub fn release(&self) {
        if self.once {
            self.used.store(false, Ordering::Release);
        }
    }

    /// Make a used one-shot handler eligible again.
    pub fn restore(&self) {
        self.used.store(false, Ordering::Release);
    }

    /// Start the resolver for `request`.
    ///
    /// The returned future is not polled here; see the runtime invoker for
    /// the normalized, panic-safe call path.
    #[must_use]
    pub fn resolve(&self, request: CapturedRequest) -> ResolverFuture {
        self.resolver.resolve(request)
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method} {}", self.pattern)?,
            None => write!(f, "* {}", self.pattern)?,
        }
        if self.once {
            f.write_str(" (once)")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("once", &self.once)
            .field("used", &self.used.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
