//! Adaptive client-credentials negotiation.
//!
//! Authorization servers disagree about which scopes they accept, and an
//! unknown scope often turns a valid client into a 400. The negotiator walks
//! an ordered ladder of form-parameter variants and stops at the first
//! response that is a structurally valid token, keeping a trail of every
//! rejected attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::classifier::{classify, Classification};
use crate::error::{AttemptError, NegotiationFailure, ScoutError, ScoutResult};
use crate::transport::{snippet, Outcome, Transport, TransportRequest};
use crate::types::{duration_ms, Credential, HttpMethod};

/// Token exchanges get 30 seconds.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens must be strictly longer than this to be accepted.
pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 50;

/// Characters of response body kept in the attempt trail.
const SNIPPET_CHARS: usize = 200;

const REQUIRED_FIELDS: [&str; 3] = ["access_token", "token_type", "expires_in"];

/// Where and as whom to negotiate.
#[derive(Clone)]
pub struct NegotiatorConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    pub min_token_length: usize,
}

impl NegotiatorConfig {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: DEFAULT_TOKEN_TIMEOUT,
            min_token_length: DEFAULT_MIN_TOKEN_LENGTH,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_min_token_length(mut self, min: usize) -> Self {
        self.min_token_length = min;
        self
    }
}

impl std::fmt::Debug for NegotiatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiatorConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("min_token_length", &self.min_token_length)
            .finish()
    }
}

/// One way of phrasing the token request.
///
/// Holds the non-secret form fields only; the client id and secret are
/// added by the negotiator when the request is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterVariant {
    label: String,
    fields: Vec<(String, String)>,
}

impl ParameterVariant {
    /// `grant_type=client_credentials` and nothing else.
    pub fn client_credentials(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fields: vec![("grant_type".into(), "client_credentials".into())],
        }
    }

    /// Add a `scope` field. An empty string sends `scope=` explicitly.
    pub fn with_scope(self, scope: impl Into<String>) -> Self {
        self.with_field("scope", scope)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn scope(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.as_str())
    }
}

/// Build the standard ladder for `scopes`.
///
/// Each non-empty scope in the given order (duplicates dropped), then an
/// explicit empty scope, then no scope field at all.
pub fn standard_ladder<S: AsRef<str>>(scopes: &[S]) -> Vec<ParameterVariant> {
    let mut seen = std::collections::HashSet::new();
    let mut ladder: Vec<ParameterVariant> = scopes
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
        .map(|s| ParameterVariant::client_credentials(format!("scope: {s}")).with_scope(s))
        .collect();

    ladder.push(ParameterVariant::client_credentials("empty-scope").with_scope(""));
    ladder.push(ParameterVariant::client_credentials("no-scope"));
    ladder
}

/// A rejected token-exchange attempt.
#[derive(Debug, Clone, Serialize)]
pub struct NegotiationAttempt {
    pub variant: String,
    pub classification: Classification,
    pub status: Option<u16>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub error: AttemptError,
}

/// Successful negotiation.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub credential: Credential,
    /// Label of the accepted variant.
    pub variant: String,
    /// Rejected attempts before the accepted one, in order.
    pub trail: Vec<NegotiationAttempt>,
}

/// Result of probing the token endpoint's parent path.
#[derive(Debug, Clone, Serialize)]
pub struct Preflight {
    pub url: String,
    pub status: Option<u16>,
    pub classification: Classification,
}

impl Preflight {
    /// Anything below 500 proves something is listening there.
    pub fn is_accessible(&self) -> bool {
        matches!(self.status, Some(s) if s < 500)
    }
}

/// Drives token acquisition over a [`Transport`].
pub struct CredentialNegotiator {
    config: NegotiatorConfig,
    transport: Arc<dyn Transport>,
}

impl CredentialNegotiator {
    pub fn new(config: NegotiatorConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &NegotiatorConfig {
        &self.config
    }

    /// Try `variants` in order until one yields a valid credential.
    ///
    /// Returns [`ScoutError::Negotiation`] with one attempt per variant when
    /// all of them are rejected, and [`ScoutError::Config`] for an empty
    /// ladder.
    pub async fn negotiate(&self, variants: &[ParameterVariant]) -> ScoutResult<Negotiated> {
        if variants.is_empty() {
            return Err(ScoutError::Config(
                "no parameter variants to negotiate with".into(),
            ));
        }

        let mut trail = Vec::new();

        for variant in variants {
            let started = Instant::now();
            let outcome = self.transport.execute(self.token_request(variant)).await;
            let elapsed = started.elapsed();

            match self.evaluate(&outcome) {
                Ok(credential) => {
                    tracing::info!(
                        variant = variant.label(),
                        token = %credential.preview(),
                        token_type = credential.token_type(),
                        expires_in = credential.expires_in().as_secs(),
                        rejected_before = trail.len(),
                        "token accepted"
                    );
                    return Ok(Negotiated {
                        credential,
                        variant: variant.label().to_string(),
                        trail,
                    });
                }
                Err(error) => {
                    if error.is_contract_mismatch() {
                        tracing::warn!(variant = variant.label(), "{error}");
                    } else {
                        tracing::debug!(variant = variant.label(), "{error}");
                    }
                    trail.push(NegotiationAttempt {
                        variant: variant.label().to_string(),
                        classification: classify(&outcome),
                        status: outcome.status(),
                        elapsed,
                        error,
                    });
                }
            }
        }

        tracing::warn!(
            attempts = trail.len(),
            token_url = %self.config.token_url,
            "all parameter variants rejected"
        );
        Err(NegotiationFailure { attempts: trail }.into())
    }

    /// GET the token endpoint's parent path to see whether the
    /// authorization server is there at all.
    pub async fn preflight(&self) -> Preflight {
        let url = preflight_url(&self.config.token_url);
        let request = TransportRequest::new(HttpMethod::Get, url.clone(), Duration::from_secs(10));
        let outcome = self.transport.execute(request).await;
        Preflight {
            url,
            status: outcome.status(),
            classification: classify(&outcome),
        }
    }

    fn token_request(&self, variant: &ParameterVariant) -> TransportRequest {
        let mut form = variant.fields().to_vec();
        form.push(("client_id".into(), self.config.client_id.clone()));
        form.push(("client_secret".into(), self.config.client_secret.clone()));

        TransportRequest::new(HttpMethod::Post, self.config.token_url.clone(), self.config.timeout)
            .header("Accept", "application/json")
            .form(form)
    }

    /// The acceptance predicate.
    fn evaluate(&self, outcome: &Outcome) -> Result<Credential, AttemptError> {
        let (status, body) = match outcome {
            Outcome::TransportFailure { kind, message } => {
                return Err(AttemptError::Transport {
                    kind: *kind,
                    message: message.clone(),
                })
            }
            Outcome::Response { status, body, .. } => (*status, body.as_str()),
        };

        if status != 200 {
            return Err(AttemptError::AuthRejected {
                status,
                snippet: snippet(body, SNIPPET_CHARS),
            });
        }

        let object = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(AttemptError::MalformedBody {
                    snippet: snippet(body, SNIPPET_CHARS),
                })
            }
        };

        let token = object.get("access_token").and_then(Value::as_str);
        let token_type = object.get("token_type").and_then(Value::as_str);
        let expires_in = object.get("expires_in").and_then(parse_expiry);

        let (token, token_type, expires_in) = match (token, token_type, expires_in) {
            (Some(t), Some(tt), Some(e)) => (t, tt, e),
            (t, tt, e) => {
                let missing = REQUIRED_FIELDS
                    .iter()
                    .zip([t.is_some(), tt.is_some(), e.is_some()])
                    .filter(|(_, ok)| !ok)
                    .map(|(name, _)| name.to_string())
                    .collect();
                return Err(AttemptError::ShapeMismatch {
                    missing,
                    present: object.keys().cloned().collect(),
                });
            }
        };

        let length = token.chars().count();
        if length <= self.config.min_token_length {
            return Err(AttemptError::ImplausibleToken {
                length,
                minimum: self.config.min_token_length,
            });
        }

        Ok(Credential::new(token, token_type, expires_in))
    }
}

/// `expires_in` as seconds; servers send it as a number or a numeric string.
fn parse_expiry(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Token URL with a trailing `/token` segment removed.
fn preflight_url(token_url: &str) -> String {
    let trimmed = token_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/token")
        .unwrap_or(trimmed)
        .to_string()
}
