//! HTTP transport for the TensorDock API.
//!
//! A [`Transport`] performs exactly one request and hands back the raw body
//! together with the status code and content type. It never interprets the
//! payload; that is the job of [`crate::normalize`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use tracing::debug;
use url::Url;

use crate::error::{Result, TensorDockError};

/// Default TensorDock API base URL.
pub const DEFAULT_BASE_URL: &str = "https://console.tensordock.com/api";

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("tensordock-cli/", env!("CARGO_PKG_VERSION"));

/// A fully described outbound request, relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path suffix appended to the base URL (e.g. `get/single`).
    pub path: String,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Create a request with no parameters, headers or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response as received from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header value, empty when absent.
    pub content_type: String,
    /// Unmodified response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Convenience constructor, mostly for tests and doubles.
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

/// Something that can deliver an [`ApiRequest`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. No retries.
    async fn send(&self, request: ApiRequest) -> Result<RawResponse>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Mirror requests and responses to the debug log.
    debug: bool,
}

impl HttpTransport {
    /// Create a transport for `base_url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, debug: bool) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            debug,
        })
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` and `query` against the base URL.
    fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url =
            Url::parse(&raw).map_err(|e| TensorDockError::InvalidUrl(format!("{raw}: {e}")))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse> {
        let url = self.url(&request.path, &request.query)?;
        // The query carries credentials; only the debug dump renders it.
        debug!(method = %request.method, path = %request.path, "API request");

        let mut builder = self.client.request(request.method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let outbound = builder.build()?;

        if self.debug {
            debug!("outbound request:\n{}", dump_request(&outbound));
        }

        let response = self.client.execute(outbound).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        if self.debug {
            debug!(
                "inbound response:\n{}",
                dump_response(status.as_u16(), &headers, &body)
            );
        }

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(RawResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Render a request the way it goes over the wire.
fn dump_request(request: &reqwest::Request) -> String {
    let mut out = format!("{} {}\n", request.method(), request.url());
    out.push_str(&dump_headers(request.headers()));
    if let Some(body) = request.body().and_then(reqwest::Body::as_bytes) {
        out.push('\n');
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}

/// Render a response status line, headers and body.
fn dump_response(status: u16, headers: &HeaderMap, body: &[u8]) -> String {
    let mut out = format!("HTTP {status}\n");
    out.push_str(&dump_headers(headers));
    out.push('\n');
    out.push_str(&String::from_utf8_lossy(body));
    out
}

fn dump_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            format!(
                "{}: {}\n",
                name,
                value.to_str().unwrap_or("<binary>")
            )
        })
        .collect()
}
