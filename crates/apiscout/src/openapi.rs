//! Swagger / OpenAPI documents found on working endpoints.
//!
//! When a probe lands on a published API description, its `paths` table is
//! a much better candidate list than guesses. Only JSON documents are read.

use serde::Serialize;
use serde_json::Value;

use crate::types::{HttpMethod, PathCandidate};

/// Paths taken from one document when following it.
pub const DEFAULT_FOLLOW_LIMIT: usize = 25;

/// Operations declared for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentedPath {
    pub path: String,
    pub methods: Vec<HttpMethod>,
}

impl DocumentedPath {
    /// True when the path contains `{param}` placeholders.
    pub fn is_templated(&self) -> bool {
        self.path.contains('{')
    }
}

/// The parts of an API description the tool uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiDocument {
    /// `"2.0"` for Swagger, `"3.x.y"` for OpenAPI.
    pub spec_version: String,
    pub title: Option<String>,
    pub version: Option<String>,
    pub base_path: Option<String>,
    pub paths: Vec<DocumentedPath>,
}

impl ApiDocument {
    /// Parse `body` as a Swagger 2 or OpenAPI 3 JSON document.
    ///
    /// Returns `None` for anything else, including JSON that lacks either the
    /// version marker or a `paths` object.
    pub fn parse(body: &str) -> Option<Self> {
        let doc: Value = serde_json::from_str(body).ok()?;
        let root = doc.as_object()?;

        let spec_version = root
            .get("openapi")
            .or_else(|| root.get("swagger"))
            .and_then(Value::as_str)?
            .to_string();
        let paths = root.get("paths")?.as_object()?;

        let info = root.get("info");
        let text = |v: Option<&Value>, key: &str| {
            v.and_then(|i| i.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let paths = paths
            .iter()
            .map(|(path, item)| DocumentedPath {
                path: path.clone(),
                methods: item
                    .as_object()
                    .map(|ops| ops.keys().filter_map(|k| HttpMethod::parse(k)).collect())
                    .unwrap_or_default(),
            })
            .collect();

        Some(Self {
            spec_version,
            title: text(info, "title"),
            version: text(info, "version"),
            base_path: text(Some(&doc), "basePath"),
            paths,
        })
    }

    /// Concrete GET paths worth probing, at most `limit` of them.
    ///
    /// Templated paths are skipped: there is no value to substitute.
    pub fn candidates(&self, limit: usize) -> Vec<PathCandidate> {
        self.paths
            .iter()
            .filter(|p| !p.is_templated() && p.methods.contains(&HttpMethod::Get))
            .take(limit)
            .map(|p| PathCandidate::get(p.path.clone()))
            .collect()
    }
}
