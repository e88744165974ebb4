//! Single-shot HTTP transport wrapping reqwest.
//!
//! Every request yields an [`Outcome`] value: a response (any status) or a
//! transport failure. Nothing is retried here; retry and fallback policy
//! belongs to the negotiator and the prober.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ScoutError, ScoutResult};
use crate::types::HttpMethod;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("apiscout/", env!("CARGO_PKG_VERSION"));

/// Response bodies are cut to this many bytes (on a char boundary).
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Why a request never produced an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Timeout,
    ConnectionError,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ConnectionError => "connection-error",
            FailureKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Normalized result of one HTTP exchange.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The server answered. Any status, including 4xx/5xx.
    Response {
        status: u16,
        body: String,
        elapsed: Duration,
    },
    /// No usable response: timeout, refused connection, bad URL, ...
    TransportFailure { kind: FailureKind, message: String },
}

impl Outcome {
    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Response { status, .. } => Some(*status),
            Outcome::TransportFailure { .. } => None,
        }
    }

    /// Response body, empty for transport failures.
    pub fn body(&self) -> &str {
        match self {
            Outcome::Response { body, .. } => body,
            Outcome::TransportFailure { .. } => "",
        }
    }
}

/// Body attached to a request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` fields, in order.
    Form(Vec<(String, String)>),
}

/// Everything needed to issue a single request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }
}

/// Executes one request and reports the result as a value.
///
/// Implementations must never panic and never surface errors other than
/// through [`Outcome::TransportFailure`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Outcome;
}

/// reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default user agent.
    pub fn new() -> ScoutResult<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a transport that identifies itself with `user_agent`.
    ///
    /// Redirects are limited to 5 hops; per-request timeouts come from
    /// each [`TransportRequest`].
    pub fn with_user_agent(user_agent: &str) -> ScoutResult<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ScoutError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Outcome {
        let started = Instant::now();

        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str())
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(RequestBody::Form(fields)) = &request.body {
            builder = builder.form(fields);
        }

        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => return failure_from(&e),
        };

        let status = resp.status().as_u16();
        // A status is already known; a broken body does not erase it.
        let body = match read_capped(resp, MAX_BODY_BYTES).await {
            Ok(bytes) => decode_body(bytes),
            Err(e) => {
                tracing::debug!(status, url = %request.url, "body read failed: {}", error_chain(&e));
                String::new()
            }
        };

        Outcome::Response {
            status,
            body,
            elapsed: started.elapsed(),
        }
    }
}

fn failure_from(e: &reqwest::Error) -> Outcome {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else if e.is_connect() {
        FailureKind::ConnectionError
    } else {
        FailureKind::Other
    };
    Outcome::TransportFailure {
        kind,
        message: error_chain(e),
    }
}

/// reqwest's top-level message hides the interesting part in `source()`.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}

/// Read at most `limit` bytes of the body; the rest is never downloaded.
async fn read_capped(mut resp: reqwest::Response, limit: usize) -> Result<Vec<u8>, reqwest::Error> {
    let mut buf = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let room = limit - buf.len();
        if chunk.len() >= room {
            buf.extend_from_slice(&chunk[..room]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn decode_body(mut bytes: Vec<u8>) -> String {
    // Drop a multi-byte character split by the cap.
    if let Err(e) = std::str::from_utf8(&bytes) {
        if e.error_len().is_none() {
            bytes.truncate(e.valid_up_to());
        }
    }
    truncate_body(String::from_utf8_lossy(&bytes).into_owned())
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_BODY_BYTES {
        let mut cut = MAX_BODY_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
