//! # HTTP Stream Client
//!
//! The production `StreamConnector`: a `reqwest` client that issues the
//! long-lived GET against the sampled-stream endpoint and exposes the response
//! body as a byte stream. `send()` resolves as soon as the response headers are
//! in; the body is never buffered as a whole. Compressed bodies (gzip, deflate,
//! brotli) are decoded by `reqwest` before they reach the framer.

use std::fmt;
use std::future::{ready, Future};
use std::time::Duration;

use futures_util::{stream, StreamExt};
use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONNECTION};
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::ingestors::error::StreamError;
use crate::ingestors::session::{ByteStream, StreamConnector};

/// The sampled-stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "https://api.twitter.com/2/tweets/sample/stream";
/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; AcmeInc/1.0)";
/// Upper bound on establishing the TCP/TLS connection. Reads have no timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// # Stream Endpoint
///
/// A validated URL plus the unescaped bearer token. `Debug` never prints the
/// token.
#[derive(Clone)]
pub struct StreamEndpoint {
    url: Url,
    bearer_token: String,
    user_agent: String,
}

impl fmt::Debug for StreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEndpoint")
            .field("url", &self.url.as_str())
            .field("bearer_token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl StreamEndpoint {
    /// Validates `url` and percent-decodes `raw_token`.
    ///
    /// # Errors
    /// `StreamError::Endpoint` when the URL is not an absolute http(s) URL or
    /// the token is empty or not UTF-8 once decoded.
    pub fn new(url: &str, raw_token: &str) -> Result<Self, StreamError> {
        let url = Url::parse(url).map_err(|e| StreamError::Endpoint(format!("'{}' is not a valid URL: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StreamError::Endpoint(format!("unsupported scheme '{}'", url.scheme())));
        }

        let bearer_token = percent_decode_str(raw_token.trim())
            .decode_utf8()
            .map_err(|e| StreamError::Endpoint(format!("bearer token is not valid UTF-8: {}", e)))?
            .into_owned();
        if bearer_token.is_empty() {
            return Err(StreamError::Endpoint("bearer token is empty".to_string()));
        }

        Ok(Self {
            url,
            bearer_token,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Replaces the default user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The stream URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The decoded bearer token.
    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    /// The user agent sent with requests.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// # HTTP Stream Connector
///
/// Holds one `reqwest::Client` (and so one connection pool) for the lifetime of
/// the session; every reconnect reuses it.
#[derive(Debug, Clone)]
pub struct HttpStreamConnector {
    client: reqwest::Client,
    url: Url,
}

impl HttpStreamConnector {
    /// Builds the client with the stream's default headers.
    ///
    /// # Errors
    /// `StreamError::Endpoint` when the token cannot be used as a header value
    /// or the TLS backend fails to initialise.
    pub fn new(endpoint: &StreamEndpoint) -> Result<Self, StreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", endpoint.bearer_token()))
            .map_err(|e| StreamError::Endpoint(format!("bearer token is not a valid header value: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(endpoint.user_agent())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StreamError::Endpoint(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: endpoint.url().clone(),
        })
    }
}

fn request_error(e: reqwest::Error) -> StreamError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        StreamError::Connect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        StreamError::Transport(e.to_string())
    } else {
        StreamError::Unclassified(e.to_string())
    }
}

/// The error a response with `status` ends in once its body is exhausted
/// without a fatal error object. Client errors other than 429 never clear on
/// retry; everything else is left to the body.
pub fn status_rejection(status: StatusCode) -> Option<StreamError> {
    if !status.is_client_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    Some(StreamError::Rejected {
        status: i64::from(status.as_u16()),
        detail: status.canonical_reason().unwrap_or("Client Error").to_string(),
    })
}

impl StreamConnector for HttpStreamConnector {
    fn connect(&self) -> impl Future<Output = Result<ByteStream, StreamError>> + Send {
        let request = self.client.get(self.url.clone());
        async move {
            let response = request.send().await.map_err(request_error)?;
            let status = response.status();
            if status.is_success() {
                debug!(status = status.as_u16(), "Stream response headers received.");
            } else {
                // The body usually carries an error object; the session decides.
                warn!(status = status.as_u16(), "Stream endpoint answered with a non-success status.");
            }

            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| StreamError::Transport(e.to_string())));
            let body: ByteStream = match status_rejection(status) {
                Some(rejection) => body.chain(stream::once(ready(Err(rejection)))).boxed(),
                None => body.boxed(),
            };
            Ok(body)
        }
    }
}
