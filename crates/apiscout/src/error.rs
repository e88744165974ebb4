//! Error types for negotiation and library setup.

use serde::Serialize;

use crate::negotiator::NegotiationAttempt;
use crate::transport::FailureKind;

/// Why a single token-exchange attempt was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptError {
    /// Network-level failure; the next variant may still work.
    #[error("transport error ({kind}): {message}")]
    Transport { kind: FailureKind, message: String },

    /// The authorization server refused the request.
    #[error("rejected with HTTP {status}: {snippet}")]
    AuthRejected { status: u16, snippet: String },

    /// HTTP 200, but the body is not a JSON object.
    #[error("HTTP 200 but the body is not a JSON object: {snippet}")]
    MalformedBody { snippet: String },

    /// HTTP 200 JSON object without the fields a token response must carry.
    /// Points at a server contract mismatch rather than bad credentials.
    /// Only key names are kept; the body may hold a token under another name.
    #[error("HTTP 200 but the token response is missing {}", .missing.join(", "))]
    ShapeMismatch {
        missing: Vec<String>,
        present: Vec<String>,
    },

    #[error("token of length {length} is not longer than the plausibility floor of {minimum}")]
    ImplausibleToken { length: usize, minimum: usize },
}

impl AttemptError {
    /// True for 200 responses that did not look like a token response.
    pub fn is_contract_mismatch(&self) -> bool {
        matches!(self, AttemptError::ShapeMismatch { .. })
    }
}

/// Every variant was tried and none produced a valid token.
///
/// The attempt trail is the diagnostic payload: one entry per variant, in
/// the order they were tried.
#[derive(thiserror::Error, Debug, Clone, Serialize)]
#[error("credential negotiation failed after {} attempt(s)", .attempts.len())]
pub struct NegotiationFailure {
    pub attempts: Vec<NegotiationAttempt>,
}

/// All errors the library returns.
#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error(transparent)]
    Negotiation(#[from] NegotiationFailure),
}

pub type ScoutResult<T> = Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_lists_fields() {
        let err = AttemptError::ShapeMismatch {
            missing: vec!["token_type".into(), "expires_in".into()],
            present: vec!["access_token".into()],
        };
        assert_eq!(
            err.to_string(),
            "HTTP 200 but the token response is missing token_type, expires_in"
        );
        assert!(err.is_contract_mismatch());
    }

    #[test]
    fn test_rejection_is_not_contract_mismatch() {
        let err = AttemptError::AuthRejected {
            status: 400,
            snippet: "invalid_scope".into(),
        };
        assert!(!err.is_contract_mismatch());
    }

    #[test]
    fn test_attempt_error_serializes_with_kind_tag() {
        let err = AttemptError::Transport {
            kind: FailureKind::Timeout,
            message: "operation timed out".into(),
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["type"], "transport");
        assert_eq!(v["kind"], "timeout");
    }
}
