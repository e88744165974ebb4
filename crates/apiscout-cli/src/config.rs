//! Configuration loading and resolution.
//!
//! A single JSON file drives every command. Lookup order: explicit
//! `--config`, `APISCOUT_CONFIG`, `./apiscout.json`, then
//! `~/.apiscout/config.json`. Credentials can be supplied or overridden
//! through the environment so they never have to live in the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use apiscout::{standard_ladder, NegotiatorConfig, ParameterVariant, PathCandidate, ProberConfig};

pub const ENV_CONFIG: &str = "APISCOUT_CONFIG";
pub const ENV_TOKEN_URL: &str = "APISCOUT_TOKEN_URL";
pub const ENV_CLIENT_ID: &str = "APISCOUT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "APISCOUT_CLIENT_SECRET";

const LOCAL_CONFIG: &str = "apiscout.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("no config file found (tried: {})", .0.join(", "))]
    NotFound(Vec<String>),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Full tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_agent: Option<String>,
    pub auth: AuthConfig,
    pub discovery: DiscoveryConfig,
    pub thresholds: Thresholds,
    pub bundle: Option<BundleConfig>,
}

/// Token endpoint and client credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_url: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Scopes to try, most specific first. Empty-scope and no-scope
    /// fallbacks are always appended.
    pub scopes: Vec<String>,
    pub timeout_secs: u64,
    pub min_token_length: usize,
    /// GET the token endpoint's parent path before negotiating.
    pub preflight: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scopes: Vec::new(),
            timeout_secs: 30,
            min_token_length: apiscout::negotiator::DEFAULT_MIN_TOKEN_LENGTH,
            preflight: true,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("timeout_secs", &self.timeout_secs)
            .field("min_token_length", &self.min_token_length)
            .field("preflight", &self.preflight)
            .finish()
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.token_url.trim().is_empty() {
            missing.push("auth.token_url");
        }
        if self.client_id.trim().is_empty() {
            missing.push("auth.client_id");
        }
        if self.client_secret.is_empty() {
            missing.push("auth.client_secret");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )))
        }
    }

    pub fn negotiator_config(&self) -> NegotiatorConfig {
        NegotiatorConfig::new(&self.token_url, &self.client_id, &self.client_secret)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_min_token_length(self.min_token_length)
    }

    pub fn ladder(&self) -> Vec<ParameterVariant> {
        standard_ladder(&self.scopes)
    }

    /// Strings that must not appear in bundle files.
    pub fn secrets(&self) -> Vec<&str> {
        [self.client_id.as_str(), self.client_secret.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// What to probe and how hard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub base_urls: Vec<String>,
    pub paths: Vec<PathCandidate>,
    pub timeout_secs: u64,
    pub concurrency: usize,
    /// Probe paths listed by Swagger/OpenAPI documents found on the way.
    pub follow_docs: bool,
    pub follow_limit: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_urls: Vec::new(),
            paths: Vec::new(),
            timeout_secs: 10,
            concurrency: apiscout::prober::DEFAULT_CONCURRENCY,
            follow_docs: false,
            follow_limit: apiscout::openapi::DEFAULT_FOLLOW_LIMIT,
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_urls.is_empty() || self.paths.is_empty() {
            return Err(ConfigError::Invalid(
                "discovery.base_urls and discovery.paths must both be non-empty".into(),
            ));
        }
        Ok(())
    }

    pub fn prober_config(&self) -> ProberConfig {
        ProberConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            concurrency: self.concurrency.max(1),
        }
    }
}

/// Success-rate tiers, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub excellent: f64,
    pub good: f64,
    pub needs_improvement: f64,
    /// Minimum rate for a zero exit status.
    pub acceptable: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            good: 75.0,
            needs_improvement: 50.0,
            acceptable: 75.0,
        }
    }
}

/// Layout and declared configuration of a client bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    pub root: PathBuf,
    pub required_files: Vec<String>,
    pub required_dirs: Vec<String>,
    pub icons_dir: String,
    pub icon_sizes: Vec<u32>,
    pub manifest: Option<ManifestRules>,
    /// HTML pages: doctype, charset and companion-script checks.
    pub pages: Vec<String>,
    pub stylesheets: Vec<String>,
    /// Scripts read for the leak scan, size warning and code checks.
    pub scripts: Vec<String>,
    /// Scripts allowed to carry credentials.
    pub secret_allowed_in: Vec<String>,
    /// Scripts that must contain `try`/`catch` or `console.error`.
    pub require_error_handling: Vec<String>,
    /// Scripts that must reference one of `required_api_markers`.
    pub require_api_usage: Vec<String>,
    pub required_api_markers: Vec<String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            required_files: Vec::new(),
            required_dirs: Vec::new(),
            icons_dir: "icons".into(),
            icon_sizes: Vec::new(),
            manifest: None,
            pages: Vec::new(),
            stylesheets: Vec::new(),
            scripts: Vec::new(),
            secret_allowed_in: Vec::new(),
            require_error_handling: Vec::new(),
            require_api_usage: Vec::new(),
            required_api_markers: ["chrome.runtime", "chrome.storage", "chrome.tabs"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Rules for the bundle's declarative manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestRules {
    pub file: String,
    pub fields: Vec<FieldRule>,
    pub required_permissions: Vec<String>,
    /// Substrings that must appear among `host_permissions`.
    pub required_hosts: Vec<String>,
}

impl Default for ManifestRules {
    fn default() -> Self {
        Self {
            file: "manifest.json".into(),
            fields: Vec::new(),
            required_permissions: Vec::new(),
            required_hosts: Vec::new(),
        }
    }
}

/// One manifest field: expected JSON type and, optionally, exact value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: JsonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Bool,
    Array,
    Object,
}

impl JsonType {
    pub fn matches(&self, v: &Value) -> bool {
        match self {
            JsonType::String => v.is_string(),
            JsonType::Integer => v.is_i64() || v.is_u64(),
            JsonType::Number => v.is_number(),
            JsonType::Bool => v.is_boolean(),
            JsonType::Array => v.is_array(),
            JsonType::Object => v.is_object(),
        }
    }
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Bool => "bool",
            JsonType::Array => "array",
            JsonType::Object => "object",
        };
        f.write_str(s)
    }
}

/// Candidate config locations, most specific first.
pub fn candidate_paths(explicit: Option<&Path>, env_path: Option<String>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    if let Some(p) = env_path.filter(|p| !p.is_empty()) {
        return vec![PathBuf::from(p)];
    }

    let mut out = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(home) = dirs::home_dir() {
        out.push(home.join(".apiscout").join("config.json"));
    }
    out
}

/// Resolve the config file to use.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let candidates = candidate_paths(explicit, std::env::var(ENV_CONFIG).ok());

    // An explicit or env-provided path is used as-is, so a typo surfaces as
    // an I/O error naming that file.
    if candidates.len() == 1 {
        return Ok(candidates[0].clone());
    }
    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .ok_or_else(|| {
            ConfigError::NotFound(candidates.iter().map(|p| p.display().to_string()).collect())
        })
}

/// Read and parse a config file.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve, read, and apply environment overrides.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = resolve_config_path(explicit)?;
    let mut config = load_file(&path)?;
    config.apply_env(|key| std::env::var(key).ok());
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

impl Config {
    /// Override credentials from `lookup` (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                *target = v;
            }
        };
        set(&mut self.auth.token_url, ENV_TOKEN_URL);
        set(&mut self.auth.client_id, ENV_CLIENT_ID);
        set(&mut self.auth.client_secret, ENV_CLIENT_SECRET);
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent
            .as_deref()
            .unwrap_or(apiscout::transport::DEFAULT_USER_AGENT)
    }
}
