//! Structural validation of a client bundle on disk.
//!
//! Every check lands in the [`ReportSink`]; nothing here aborts early except
//! the manifest section when the manifest cannot be parsed.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::config::{BundleConfig, ManifestRules};
use crate::report::ReportSink;

/// Scripts above this size get a warning.
pub const LARGE_SCRIPT_BYTES: u64 = 100 * 1024;

pub struct ArtifactStructuralValidator<'a> {
    config: &'a BundleConfig,
    root: PathBuf,
    secrets: Vec<String>,
}

impl<'a> ArtifactStructuralValidator<'a> {
    pub fn new(config: &'a BundleConfig) -> Self {
        Self {
            config,
            root: config.root.clone(),
            secrets: Vec::new(),
        }
    }

    /// Validate a different directory than the configured one.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Values that must not appear in scripts outside the allow-list.
    pub fn with_secrets<S: AsRef<str>>(mut self, secrets: &[S]) -> Self {
        self.secrets = secrets
            .iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run every section.
    pub fn validate(&self, sink: &mut ReportSink) {
        tracing::debug!(root = %self.root.display(), "validating bundle");
        self.structure(sink);
        if let Some(rules) = &self.config.manifest {
            self.manifest(rules, sink);
        }
        self.pages(sink);
        self.stylesheets(sink);
        self.scripts(sink);
    }

    fn structure(&self, sink: &mut ReportSink) {
        sink.section("Bundle structure");
        if !self.root.is_dir() {
            sink.fail(
                "bundle root exists",
                format!("{} is not a directory", self.root.display()),
            );
            return;
        }

        for file in &self.config.required_files {
            let ok = self.root.join(file).is_file();
            sink.check(format!("{file} exists"), ok, if ok { "" } else { "missing" });
        }
        for dir in &self.config.required_dirs {
            let ok = self.root.join(dir).is_dir();
            sink.check(format!("{dir}/ exists"), ok, if ok { "" } else { "missing" });
        }
        for size in &self.config.icon_sizes {
            let rel = format!("{}/icon{size}.png", self.config.icons_dir);
            let ok = self.root.join(&rel).is_file();
            sink.check(format!("{rel} exists"), ok, if ok { "" } else { "missing" });
        }
    }

    fn manifest(&self, rules: &ManifestRules, sink: &mut ReportSink) {
        sink.section("Manifest");
        let path = self.root.join(&rules.file);
        let manifest: Value = match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(v) => {
                sink.pass(format!("{} is valid JSON", rules.file));
                v
            }
            Err(e) => {
                sink.fail(format!("{} is valid JSON", rules.file), e);
                return;
            }
        };

        for field in &rules.fields {
            let name = format!("field {}", field.name);
            match manifest.get(&field.name) {
                None => sink.fail(name, "missing"),
                Some(v) if !field.kind.matches(v) => {
                    sink.fail(name, format!("expected {}", field.kind))
                }
                Some(v) => match &field.equals {
                    Some(expected) if expected != v => {
                        sink.fail(name, format!("expected {expected}, found {v}"))
                    }
                    _ => sink.pass(name),
                },
            }
        }

        let permissions = string_list(&manifest, "permissions");
        for perm in &rules.required_permissions {
            let ok = permissions.iter().any(|p| p == perm);
            sink.check(
                format!("permission {perm}"),
                ok,
                if ok { "" } else { "not declared" },
            );
        }

        let hosts = string_list(&manifest, "host_permissions");
        for host in &rules.required_hosts {
            let ok = hosts.iter().any(|h| h.contains(host.as_str()));
            sink.check(
                format!("host permission {host}"),
                ok,
                if ok { "" } else { "not declared" },
            );
        }
    }

    fn pages(&self, sink: &mut ReportSink) {
        if self.config.pages.is_empty() {
            return;
        }
        sink.section("Pages");
        for page in &self.config.pages {
            let text = match std::fs::read_to_string(self.root.join(page)) {
                Ok(t) => t,
                Err(e) => {
                    sink.fail(format!("{page} readable"), e.to_string());
                    continue;
                }
            };
            let lower = text.to_ascii_lowercase();

            sink.check(
                format!("{page} has doctype"),
                lower.trim_start().starts_with("<!doctype html"),
                "",
            );
            sink.check(
                format!("{page} declares UTF-8"),
                lower.contains("charset=\"utf-8\"") || lower.contains("charset=utf-8"),
                "",
            );

            if let Some(script) = companion_script(page) {
                let ok = text.contains(&script);
                sink.check(
                    format!("{page} loads {script}"),
                    ok,
                    if ok { "" } else { "no reference" },
                );
            }
        }
    }

    fn stylesheets(&self, sink: &mut ReportSink) {
        if self.config.stylesheets.is_empty() {
            return;
        }
        sink.section("Stylesheets");
        for sheet in &self.config.stylesheets {
            match std::fs::read_to_string(self.root.join(sheet)) {
                Err(e) => sink.fail(format!("{sheet} readable"), e.to_string()),
                Ok(css) if css.trim().is_empty() => sink.fail(format!("{sheet} has rules"), "empty"),
                Ok(css) => {
                    let ok = css.contains('{') && css.contains('}');
                    sink.check(
                        format!("{sheet} has rules"),
                        ok,
                        if ok { "" } else { "no rule block" },
                    );
                }
            }
        }
    }

    fn scripts(&self, sink: &mut ReportSink) {
        if self.config.scripts.is_empty() {
            return;
        }
        sink.section("Scripts");
        if self.secrets.is_empty() {
            sink.warn("no client credentials configured, leak scan skipped");
        }

        for script in &self.config.scripts {
            let path = self.root.join(script);
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    sink.fail(format!("{script} readable"), e.to_string());
                    continue;
                }
            };
            if bytes.len() as u64 > LARGE_SCRIPT_BYTES {
                sink.warn(format!("{script} is {} KB", bytes.len() / 1024));
            }

            let text = String::from_utf8_lossy(&bytes);

            if self.config.require_error_handling.contains(script) {
                let ok = has_error_handling(&text);
                sink.check(
                    format!("{script} handles errors"),
                    ok,
                    if ok { "" } else { "no try/catch or console.error" },
                );
            }

            if self.config.require_api_usage.contains(script) {
                let ok = self
                    .config
                    .required_api_markers
                    .iter()
                    .any(|m| text.contains(m.as_str()));
                sink.check(
                    format!("{script} uses platform APIs"),
                    ok,
                    if ok {
                        String::new()
                    } else {
                        format!("none of {}", self.config.required_api_markers.join(", "))
                    },
                );
            }

            if self.secrets.is_empty() || self.config.secret_allowed_in.contains(script) {
                continue;
            }
            let leaked = self.secrets.iter().any(|s| text.contains(s.as_str()));
            sink.check(
                format!("{script} has no embedded credentials"),
                !leaked,
                if leaked { "client credential found" } else { "" },
            );
        }
    }
}

fn has_error_handling(source: &str) -> bool {
    static ERROR_HANDLING: OnceLock<Regex> = OnceLock::new();
    ERROR_HANDLING
        .get_or_init(|| {
            Regex::new(r"try\s*\{|catch\s*\(|console\.error\s*\(")
                .expect("error handling regex is valid")
        })
        .is_match(source)
}

/// `popup.html` -> `popup.js`.
fn companion_script(page: &str) -> Option<String> {
    let stem = Path::new(page).file_stem()?.to_str()?;
    Some(format!("{stem}.js"))
}

fn string_list(doc: &Value, key: &str) -> Vec<String> {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_script() {
        assert_eq!(companion_script("popup.html").as_deref(), Some("popup.js"));
        assert_eq!(companion_script("pages/options.html").as_deref(), Some("options.js"));
    }

    #[test]
    fn test_error_handling_patterns() {
        assert!(has_error_handling("try {\n  go();\n} catch (e) {}"));
        assert!(has_error_handling("try{ go() } finally {}"));
        assert!(has_error_handling("p.then(ok, err => console.error (err))"));
        assert!(!has_error_handling("console.log('fine'); const tryhard = 1;"));
    }

    #[test]
    fn test_string_list_ignores_non_strings() {
        let doc = serde_json::json!({"permissions": ["storage", 3, "tabs"], "x": "y"});
        assert_eq!(string_list(&doc, "permissions"), vec!["storage", "tabs"]);
        assert!(string_list(&doc, "x").is_empty());
        assert!(string_list(&doc, "missing").is_empty());
    }

    #[test]
    fn test_missing_root_is_one_failure() {
        let cfg = BundleConfig {
            root: PathBuf::from("/definitely/not/here"),
            required_files: vec!["manifest.json".into()],
            ..BundleConfig::default()
        };
        let mut sink = ReportSink::default();
        ArtifactStructuralValidator::new(&cfg).validate(&mut sink);
        assert_eq!(sink.checks().len(), 1);
        assert!(!sink.checks()[0].passed);
    }
}
