//! Core data types shared by the negotiator, prober and aggregator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;

/// HTTP methods a probe may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Parse a method name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "HEAD" => Some(HttpMethod::Head),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// A candidate path plus the method to probe it with.
///
/// Deserializes from a bare string (`"/objects"`, probed with GET) or from
/// `{ "path": "/objects", "method": "POST" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "PathCandidateRepr")]
pub struct PathCandidate {
    pub path: String,
    pub method: HttpMethod,
}

impl PathCandidate {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
        }
    }

    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathCandidateRepr {
    Bare(String),
    Full {
        path: String,
        #[serde(default)]
        method: HttpMethod,
    },
}

impl From<PathCandidateRepr> for PathCandidate {
    fn from(repr: PathCandidateRepr) -> Self {
        match repr {
            PathCandidateRepr::Bare(path) => PathCandidate::get(path),
            PathCandidateRepr::Full { path, method } => PathCandidate { path, method },
        }
    }
}

/// One cell of the discovery matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
}

impl ProbeTarget {
    pub fn new(base_url: impl Into<String>, candidate: &PathCandidate) -> Self {
        Self {
            base_url: base_url.into(),
            path: candidate.path.clone(),
            method: candidate.method,
        }
    }

    /// Absolute URL: plain concatenation, duplicate slashes are kept.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

impl std::fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url())
    }
}

/// A bearer credential obtained from a validated token exchange.
///
/// The token is never printed in full: `Debug` redacts it and
/// [`Credential::preview`] shows only a short prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    token_type: String,
    expires_in: u64,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
        }
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    pub fn token_len(&self) -> usize {
        self.access_token.chars().count()
    }

    /// First eight characters of the token followed by an ellipsis.
    pub fn preview(&self) -> String {
        let head: String = self.access_token.chars().take(8).collect();
        format!("{head}…")
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.preview())
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of executing one [`ProbeTarget`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub target: ProbeTarget,
    /// `None` when the request never got a response.
    pub status: Option<u16>,
    /// Response body, truncated.
    pub body: String,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub classification: Classification,
    /// Transport error text, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        self.classification == Classification::Reachable
    }
}

/// Serialize durations as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_concatenation_keeps_slashes() {
        let t = ProbeTarget::new("https://api.example/data/", &PathCandidate::get("/objects"));
        assert_eq!(t.url(), "https://api.example/data//objects");

        let empty = ProbeTarget::new("https://api.example/data", &PathCandidate::get(""));
        assert_eq!(empty.url(), "https://api.example/data");
    }

    #[test]
    fn test_path_candidate_deserialize_forms() {
        let parsed: Vec<PathCandidate> =
            serde_json::from_str(r#"["/health", {"path": "/objects", "method": "POST"}, {"path": "/x"}]"#)
                .unwrap();
        assert_eq!(parsed[0], PathCandidate::get("/health"));
        assert_eq!(parsed[1], PathCandidate::new("/objects", HttpMethod::Post));
        assert_eq!(parsed[2].method, HttpMethod::Get);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.secret-part";
        let cred = Credential::new(token, "Bearer", 3600);
        let dbg = format!("{cred:?}");
        assert!(!dbg.contains("secret-part"));
        assert!(dbg.contains("eyJhbGci"));
    }

    #[test]
    fn test_authorization_header() {
        assert_eq!(Credential::new("abc", "bearer", 1).authorization(), "Bearer abc");
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(HttpMethod::parse("get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("Options"), Some(HttpMethod::Options));
        assert_eq!(HttpMethod::parse("TRACE"), None);
    }
}
