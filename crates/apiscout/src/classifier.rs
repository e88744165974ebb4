//! Response classification.
//!
//! Maps a raw [`Outcome`] to what it says about the API surface. A 401 means
//! the path exists but wants other credentials or scopes; a 404 means the
//! guess was wrong. Keeping them apart is the point of the tool.

use serde::{Deserialize, Serialize};

use crate::transport::Outcome;

/// Semantic class of a single HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Reachable,
    AuthRequired,
    Forbidden,
    NotFound,
    ServerError,
    TransportError,
    Other,
}

impl Classification {
    /// Every class, in report order.
    pub const ALL: [Classification; 7] = [
        Classification::Reachable,
        Classification::AuthRequired,
        Classification::Forbidden,
        Classification::NotFound,
        Classification::ServerError,
        Classification::TransportError,
        Classification::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Reachable => "reachable",
            Classification::AuthRequired => "auth-required",
            Classification::Forbidden => "forbidden",
            Classification::NotFound => "not-found",
            Classification::ServerError => "server-error",
            Classification::TransportError => "transport-error",
            Classification::Other => "other",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an outcome. Pure and total.
pub fn classify(outcome: &Outcome) -> Classification {
    match outcome {
        Outcome::TransportFailure { .. } => Classification::TransportError,
        Outcome::Response { status, .. } => classify_status(*status),
    }
}

/// Classify a bare status code.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Reachable,
        401 => Classification::AuthRequired,
        403 => Classification::Forbidden,
        404 => Classification::NotFound,
        500..=599 => Classification::ServerError,
        _ => Classification::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FailureKind;
    use std::time::Duration;

    fn response(status: u16) -> Outcome {
        Outcome::Response {
            status,
            body: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_transport_failure_wins() {
        for kind in [FailureKind::Timeout, FailureKind::ConnectionError, FailureKind::Other] {
            let outcome = Outcome::TransportFailure {
                kind,
                message: "boom".into(),
            };
            assert_eq!(classify(&outcome), Classification::TransportError);
        }
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(classify(&response(200)), Classification::Reachable);
        assert_eq!(classify(&response(204)), Classification::Reachable);
        assert_eq!(classify(&response(299)), Classification::Reachable);
        assert_eq!(classify(&response(401)), Classification::AuthRequired);
        assert_eq!(classify(&response(403)), Classification::Forbidden);
        assert_eq!(classify(&response(404)), Classification::NotFound);
        assert_eq!(classify(&response(500)), Classification::ServerError);
        assert_eq!(classify(&response(503)), Classification::ServerError);
        assert_eq!(classify(&response(301)), Classification::Other);
        assert_eq!(classify(&response(400)), Classification::Other);
        assert_eq!(classify(&response(429)), Classification::Other);
        assert_eq!(classify(&response(100)), Classification::Other);
    }

    /// Every status in 100..=599 matches exactly one rule.
    #[test]
    fn test_partition_has_no_gaps_or_overlaps() {
        for status in 100u16..=599 {
            let rules = [
                (200..=299).contains(&status),
                status == 401,
                status == 403,
                status == 404,
                (500..=599).contains(&status),
            ];
            let specific = rules.iter().filter(|m| **m).count();
            assert!(specific <= 1, "status {status} matched several rules");

            let class = classify_status(status);
            if specific == 0 {
                assert_eq!(class, Classification::Other, "status {status}");
            } else {
                assert_ne!(class, Classification::Other, "status {status}");
            }
            // Deterministic.
            assert_eq!(class, classify(&response(status)));
        }
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&Classification::AuthRequired).unwrap();
        assert_eq!(json, "\"auth-required\"");
        for c in Classification::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json.trim_matches('"'), c.as_str());
        }
    }
}
