//! Capture layer for [`reqwest`].
//!
//! [`InterceptedClient`] wraps a `reqwest::Client`. Every request executed
//! through it is captured and run through a [`MockServer`]; the real
//! `reqwest` exchange is only performed when the pipeline bypasses the
//! request.
//!
//! ```no_run
//! use interpose_core::{Handler, Response, StatusCode};
//! use interpose_runtime::{InterceptedClient, MockServer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::new([Handler::get("https://api.test/user", |_| async {
//!     Ok(Some(Response::text(StatusCode::OK, "octocat")))
//! })?]);
//! server.listen();
//!
//! let client = InterceptedClient::new(reqwest::Client::new(), server);
//! let request = client.get("https://api.test/user").build()?;
//! let response = client.execute(request).await?;
//! assert_eq!(response.text().await?, "octocat");
//! # Ok(())
//! # }
//! ```

use crate::error::PipelineError;
use crate::server::MockServer;
use bytes::Bytes;
use interpose_core::{CapturedRequest, NetworkError, Proceed, RequestError, Response};
use thiserror::Error;

/// Errors from [`InterceptedClient::execute`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The outgoing request could not be captured.
    #[error("Failed to capture request: {0}")]
    Capture(#[from] RequestError),

    /// The pipeline failed the request.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The settled response could not be converted back.
    #[error("Failed to build response: {0}")]
    Http(#[from] http::Error),
}

impl ClientError {
    /// The real network error, if that is what failed.
    #[must_use]
    pub const fn network_error(&self) -> Option<&NetworkError> {
        match self {
            Self::Pipeline(PipelineError::Network(error)) => Some(error),
            _ => None,
        }
    }
}

/// A `reqwest::Client` whose requests go through a [`MockServer`].
#[derive(Debug, Clone)]
pub struct InterceptedClient {
    client: reqwest::Client,
    server: MockServer,
}

impl InterceptedClient {
    /// Wrap `client`, routing its requests through `server`.
    #[must_use]
    pub const fn new(client: reqwest::Client, server: MockServer) -> Self {
        Self { client, server }
    }

    /// The wrapped client.
    #[must_use]
    pub const fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// The server requests are routed through.
    #[must_use]
    pub const fn server(&self) -> &MockServer {
        &self.server
    }

    /// Start a request with the wrapped client.
    ///
    /// Build it, then pass it to [`execute`](Self::execute).
    pub fn request<U: reqwest::IntoUrl>(&self, method: reqwest::Method, url: U) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    /// Start a `GET` request.
    pub fn get<U: reqwest::IntoUrl>(&self, url: U) -> reqwest::RequestBuilder {
        self.client.get(url)
    }

    /// Start a `POST` request.
    pub fn post<U: reqwest::IntoUrl>(&self, url: U) -> reqwest::RequestBuilder {
        self.client.post(url)
    }

    /// Capture `request` and run it through the pipeline.
    ///
    /// Streaming bodies are not captured; the snapshot then has no body.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Capture`] if the request URL cannot be captured
    /// - [`ClientError::Pipeline`] if the pipeline or the real network
    ///   failed the request
    /// - [`ClientError::Http`] if the response cannot be rebuilt
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, ClientError> {
        let captured = capture(&request)?;

        let client = self.client.clone();
        let proceed = Proceed::new(move || async move {
            let response = client.execute(request).await.map_err(network_error)?;
            buffer(response).await
        });

        let settlement = self.server.handle(captured, proceed).await?;
        Ok(into_reqwest(settlement.into_response())?)
    }
}

fn capture(request: &reqwest::Request) -> Result<CapturedRequest, RequestError> {
    let url = request
        .url()
        .as_str()
        .parse()
        .map_err(|e: http::uri::InvalidUri| RequestError::InvalidUrl {
            url: request.url().to_string(),
            reason: e.to_string(),
        })?;
    let body = request
        .body()
        .and_then(reqwest::Body::as_bytes)
        .map(Bytes::copy_from_slice);

    CapturedRequest::new(request.method().clone(), url, request.headers().clone(), body)
}

async fn buffer(response: reqwest::Response) -> Result<Response, NetworkError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(network_error)?;
    Ok(Response::from_parts(status, headers, body))
}

fn into_reqwest(response: Response) -> Result<reqwest::Response, http::Error> {
    let (status, headers, body) = response.into_parts();
    let mut builder = http::Response::builder().status(status);
    if let Some(target) = builder.headers_mut() {
        *target = headers;
    }
    Ok(reqwest::Response::from(builder.body(body)?))
}

#[allow(clippy::needless_pass_by_value)] // used as a map_err adapter
fn network_error(error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout(error.to_string())
    } else if error.is_connect() {
        NetworkError::Connection(error.to_string())
    } else {
        NetworkError::Transport(error.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http::{HeaderValue, StatusCode};

    #[test]
    fn captures_method_url_headers_and_body() {
        let client = reqwest::Client::new();
        let request = client
            .post("https://api.test/items?page=2")
            .header("x-trace", "abc")
            .body("payload")
            .build()
            .unwrap();

        let captured = capture(&request).unwrap();
        assert_eq!(captured.method(), http::Method::POST);
        assert_eq!(captured.url().to_string(), "https://api.test/items?page=2");
        assert_eq!(captured.headers()["x-trace"], "abc");
        assert_eq!(captured.text(), Some("payload"));
    }

    #[tokio::test]
    async fn converts_responses_back_to_reqwest() {
        let response = Response::text(StatusCode::IM_A_TEAPOT, "short and stout")
            .with_header(http::header::ETAG, HeaderValue::from_static("\"v1\""));

        let converted = into_reqwest(response).unwrap();
        assert_eq!(converted.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(converted.headers()[http::header::ETAG], "\"v1\"");
        assert_eq!(converted.text().await.unwrap(), "short and stout");
    }
}
