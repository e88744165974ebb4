//! Terminal and JSON rendering.
//!
//! Global flags are published as `APISCOUT_*` environment variables by
//! `main`, so any module can ask how to print without threading options
//! through every call.

use std::fmt::Write as _;

use apiscout::{ApiDocument, Classification, DiscoveryReport, NegotiationAttempt, Negotiated, Preflight};

use crate::report::{CheckResult, Summary, Tier};

pub const ENV_JSON: &str = "APISCOUT_JSON";
pub const ENV_QUIET: &str = "APISCOUT_QUIET";
pub const ENV_NO_COLOR: &str = "APISCOUT_NO_COLOR";

pub fn is_json() -> bool {
    std::env::var_os(ENV_JSON).is_some()
}

pub fn is_quiet() -> bool {
    std::env::var_os(ENV_QUIET).is_some()
}

pub fn no_color() -> bool {
    std::env::var_os(ENV_NO_COLOR).is_some() || std::env::var_os("NO_COLOR").is_some()
}

/// Human output is suppressed by `--json` and `--quiet`.
pub fn is_human() -> bool {
    !is_json() && !is_quiet()
}

pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: cannot serialize output: {e}"),
    }
}

/// Fixed-width marker for a probe classification.
pub fn marker(class: Classification) -> &'static str {
    match class {
        Classification::Reachable => "[OK]",
        Classification::AuthRequired => "[AUTH]",
        Classification::Forbidden => "[DENY]",
        Classification::NotFound => "[MISS]",
        Classification::ServerError => "[5XX]",
        Classification::TransportError => "[ERR]",
        Classification::Other => "[??]",
    }
}

pub fn check_line(check: &CheckResult) -> String {
    let mark = if check.passed { "[OK]" } else { "[!!]" };
    if check.detail.is_empty() {
        format!("{mark} {}", check.name)
    } else {
        format!("{mark} {}: {}", check.name, check.detail)
    }
}

pub fn render_preflight(pre: &Preflight) -> String {
    let status = pre
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "no response".into());
    let mark = if pre.is_accessible() { "[OK]" } else { "[!!]" };
    format!("{mark} token endpoint {} ({status})", pre.url)
}

/// One line per rejected variant.
pub fn render_trail(attempts: &[NegotiationAttempt]) -> String {
    let mut out = String::new();
    for a in attempts {
        let status = a.status.map(|s| s.to_string()).unwrap_or_else(|| "---".into());
        let _ = writeln!(
            out,
            "  [!!] {:<24} {status:>3}  {}  ({} ms)",
            a.variant,
            a.error,
            a.elapsed.as_millis()
        );
    }
    out
}

pub fn render_negotiated(n: &Negotiated) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Credential negotiation");
    out.push_str(&render_trail(&n.trail));
    let _ = writeln!(
        out,
        "  [OK] {:<24} {} token {} ({} chars, expires in {}s)",
        n.variant,
        n.credential.token_type(),
        n.credential.preview(),
        n.credential.token_len(),
        n.credential.expires_in().as_secs()
    );
    out
}

pub fn negotiated_json(n: &Negotiated) -> serde_json::Value {
    serde_json::json!({
        "variant": n.variant,
        "token_type": n.credential.token_type(),
        "token_preview": n.credential.preview(),
        "token_length": n.credential.token_len(),
        "expires_in": n.credential.expires_in().as_secs(),
        "trail": n.trail,
    })
}

/// Per-base outcome listing, working endpoints, documents and counts.
pub fn render_discovery(report: &DiscoveryReport, documents: &[(String, ApiDocument)]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Discovery: {} probe(s), {} working ({:.1}%)",
        report.total(),
        report.working.len(),
        report.success_rate()
    );

    for base in report.base_urls() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{base}");
        for o in report.for_base(base) {
            let status = o.status.map(|s| s.to_string()).unwrap_or_else(|| "---".into());
            let _ = write!(
                out,
                "  {:<6} {:<7} {}  {status}",
                marker(o.classification),
                o.target.method.as_str(),
                o.target.path
            );
            if let Some(err) = &o.error {
                let _ = write!(out, "  {err}");
            }
            let _ = writeln!(out, "  ({} ms)", o.elapsed.as_millis());
        }
    }

    let _ = writeln!(out);
    if report.working.is_empty() {
        let _ = writeln!(out, "No working endpoints.");
    } else {
        let _ = writeln!(out, "Working endpoints");
        for w in &report.working {
            let _ = write!(out, "  {} {}", w.target.method, w.target.url());
            if let Some(shape) = &w.shape {
                let _ = write!(out, "  {shape}");
            }
            let _ = writeln!(out);
        }
    }

    if !documents.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "API documents");
        for (url, doc) in documents {
            let title = doc.title.as_deref().unwrap_or("untitled");
            let version = doc.version.as_deref().unwrap_or("?");
            let _ = writeln!(
                out,
                "  {url}: {title} {version} (format {}), {} path(s)",
                doc.spec_version,
                doc.paths.len()
            );
        }
    }

    let _ = writeln!(out);
    let counts: Vec<String> = report
        .counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(c, n)| format!("{c} {n}"))
        .collect();
    let _ = writeln!(out, "Breakdown: {}", if counts.is_empty() { "none".into() } else { counts.join(", ") });
    out
}

/// Totals, then every failed check and every warning.
pub fn render_summary(summary: &Summary, failures: &[&CheckResult], warnings: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "Summary");
    let _ = writeln!(out, "=======");
    let _ = writeln!(
        out,
        "Checks: {} run, {} passed, {} failed ({:.1}%) in {:.1}s",
        summary.run, summary.passed, summary.failed, summary.success_rate, summary.duration_secs
    );
    if !failures.is_empty() {
        let _ = writeln!(out, "Failures: {}", failures.len());
        for check in failures {
            let _ = writeln!(out, "  {} ({})", check_line(check), check.section);
        }
    }
    if !warnings.is_empty() {
        let _ = writeln!(out, "Warnings: {}", warnings.len());
        for warning in warnings {
            let _ = writeln!(out, "  [??] {warning}");
        }
    }
    let _ = writeln!(out, "Status: {}", paint_tier(summary.tier));
    out
}

fn paint_tier(tier: Tier) -> String {
    if no_color() {
        return tier.label().to_string();
    }
    let code = match tier {
        Tier::Excellent | Tier::Good => "32",
        Tier::NeedsImprovement => "33",
        Tier::Poor => "31",
    };
    format!("\x1b[{code}m{}\x1b[0m", tier.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use apiscout::{aggregate, AttemptError, Credential, PathCandidate, ProbeOutcome, ProbeTarget};

    fn outcome(base: &str, path: &str, status: Option<u16>, body: &str) -> ProbeOutcome {
        ProbeOutcome {
            target: ProbeTarget::new(base, &PathCandidate::get(path)),
            status,
            body: body.into(),
            elapsed: Duration::from_millis(12),
            classification: status
                .map(apiscout::classify_status)
                .unwrap_or(Classification::TransportError),
            error: status.is_none().then(|| "timeout: operation timed out".to_string()),
        }
    }

    #[test]
    fn test_markers_are_distinct() {
        let mut seen: Vec<&str> = Classification::ALL.iter().map(|c| marker(*c)).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), Classification::ALL.len());
    }

    #[test]
    fn test_check_line() {
        let ok = CheckResult {
            section: "s".into(),
            name: "manifest.json exists".into(),
            passed: true,
            detail: String::new(),
        };
        assert_eq!(check_line(&ok), "[OK] manifest.json exists");
        let bad = CheckResult {
            passed: false,
            detail: "missing".into(),
            ..ok
        };
        assert_eq!(check_line(&bad), "[!!] manifest.json exists: missing");
    }

    #[test]
    fn test_render_summary_lists_failures_and_warnings() {
        let summary = Summary {
            run: 4,
            passed: 3,
            failed: 1,
            success_rate: 75.0,
            duration_secs: 0.2,
            tier: Tier::Good,
            verdict: crate::report::Verdict::Pass,
        };
        let bad = CheckResult {
            section: "Scripts".into(),
            name: "popup.js handles errors".into(),
            passed: false,
            detail: "no try/catch or console.error".into(),
        };
        let warnings = vec!["popup.js is 120 KB".to_string()];
        let text = render_summary(&summary, &[&bad], &warnings);

        assert!(text.contains("Checks: 4 run, 3 passed, 1 failed (75.0%)"));
        assert!(text.contains("Failures: 1"));
        assert!(text.contains("  [!!] popup.js handles errors: no try/catch or console.error (Scripts)"));
        assert!(text.contains("Warnings: 1"));
        assert!(text.contains("  [??] popup.js is 120 KB"));

        let clean = render_summary(&summary, &[], &[]);
        assert!(!clean.contains("Failures"));
        assert!(!clean.contains("Warnings"));
    }

    #[test]
    fn test_render_discovery_groups_by_base() {
        let report = aggregate(vec![
            outcome("https://a.example/api", "/v1/objects/Account", Some(404), ""),
            outcome("https://a.example/api", "/objects", Some(200), "[1,2,3]"),
            outcome("https://b.example", "/objects", None, ""),
        ]);
        let text = render_discovery(&report, &[]);

        assert!(text.starts_with("Discovery: 3 probe(s), 1 working (33.3%)"));
        let a = text.find("https://a.example/api\n").unwrap();
        let b = text.find("https://b.example\n").unwrap();
        assert!(a < b);
        assert!(text.contains("[MISS] GET     /v1/objects/Account  404"));
        assert!(text.contains("[ERR]  GET     /objects  ---  timeout: operation timed out"));
        assert!(text.contains("GET https://a.example/api/objects  array of 3 items"));
        assert!(text.contains("Breakdown: reachable 1, not-found 1, transport-error 1"));
    }

    #[test]
    fn test_render_empty_discovery() {
        let text = render_discovery(&aggregate(Vec::new()), &[]);
        assert!(text.contains("No working endpoints."));
        assert!(text.contains("Breakdown: none"));
    }

    #[test]
    fn test_render_negotiated_hides_token() {
        let token = format!("secret-{}", "x".repeat(60));
        let n = Negotiated {
            credential: Credential::new(token.clone(), "Bearer", 3600),
            variant: "no-scope".into(),
            trail: vec![NegotiationAttempt {
                variant: "scope: api".into(),
                classification: Classification::Other,
                status: Some(400),
                elapsed: Duration::from_millis(80),
                error: AttemptError::AuthRejected {
                    status: 400,
                    snippet: "invalid_scope".into(),
                },
            }],
        };
        let text = render_negotiated(&n);
        assert!(!text.contains(&token));
        assert!(text.contains("scope: api"));
        assert!(text.contains("400"));
        assert!(text.contains("[OK] no-scope"));

        let json = negotiated_json(&n).to_string();
        assert!(!json.contains(&token));
    }
}
