//! `apiscout discover`: negotiate, then map which endpoints answer.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;

use apiscout::{
    aggregate, ApiDocument, Credential, DiscoveryReport, EndpointMatrixProber, ProbeOutcome,
    ProbeTarget, Transport,
};

use crate::config::{Config, DiscoveryConfig};
use crate::output;
use crate::report::Verdict;

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Force the documented-path pass on, whatever the config says.
    pub follow_docs: bool,
    /// Overrides `thresholds.acceptable`.
    pub acceptable: Option<f64>,
}

/// Probe results plus any API documents found along the way.
#[derive(Debug)]
pub struct Survey {
    pub report: DiscoveryReport,
    /// `(url the document was served from, document)`.
    pub documents: Vec<(String, ApiDocument)>,
}

pub async fn run(config: &Config, opts: DiscoverOptions) -> Result<Verdict> {
    config.auth.validate()?;
    config.discovery.validate()?;

    let transport = super::transport(config)?;
    let negotiator = super::negotiator(config, transport.clone());
    let negotiated = match super::acquire(&negotiator, config).await? {
        Ok(n) => n,
        Err(failure) => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "ok": false,
                    "error": failure.to_string(),
                    "attempts": failure.attempts,
                }));
            } else {
                super::negotiate::report_failure(&failure);
            }
            return Ok(Verdict::Fail);
        }
    };

    if output::is_human() {
        print!("{}", output::render_negotiated(&negotiated));
        println!();
    }

    let follow = opts.follow_docs || config.discovery.follow_docs;
    let survey = survey(&config.discovery, follow, transport, &negotiated.credential).await;

    let acceptable = opts.acceptable.unwrap_or(config.thresholds.acceptable);
    let verdict = Verdict::from_rate(survey.report.success_rate(), acceptable);

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "ok": true,
            "variant": negotiated.variant,
            "report": survey.report,
            "success_rate": survey.report.success_rate(),
            "documents": survey.documents,
            "verdict": verdict,
        }));
    } else if !output::is_quiet() {
        print!("{}", output::render_discovery(&survey.report, &survey.documents));
    }
    Ok(verdict)
}

/// Probe the configured matrix, then optionally the GET paths listed by any
/// API documents it turned up.
pub async fn survey(
    discovery: &DiscoveryConfig,
    follow_docs: bool,
    transport: Arc<dyn Transport>,
    credential: &Credential,
) -> Survey {
    let prober = EndpointMatrixProber::new(discovery.prober_config(), transport);
    let mut outcomes = prober
        .scan(credential, &discovery.base_urls, &discovery.paths)
        .await;

    let mut documents = Vec::new();
    if follow_docs {
        let (found, extra) = follow_documents(&outcomes, discovery.follow_limit);
        if !extra.is_empty() {
            tracing::info!(count = extra.len(), "probing documented paths");
            outcomes.extend(prober.probe(credential, &extra).await);
        }
        documents = found;
    }

    let report = aggregate(outcomes);
    tracing::info!(
        probes = report.total(),
        working = report.working.len(),
        "discovery finished"
    );
    Survey { report, documents }
}

/// API documents among reachable outcomes, and the targets they add.
///
/// Documented paths are resolved against the base URL the document was
/// found under. Targets already probed are not repeated.
pub fn follow_documents(
    outcomes: &[ProbeOutcome],
    limit: usize,
) -> (Vec<(String, ApiDocument)>, Vec<ProbeTarget>) {
    let mut seen: HashSet<ProbeTarget> = outcomes.iter().map(|o| o.target.clone()).collect();
    let mut documents = Vec::new();
    let mut extra = Vec::new();

    for outcome in outcomes.iter().filter(|o| o.is_reachable()) {
        let Some(doc) = ApiDocument::parse(&outcome.body) else {
            continue;
        };
        for candidate in doc.candidates(limit) {
            let target = ProbeTarget::new(outcome.target.base_url.clone(), &candidate);
            if seen.insert(target.clone()) {
                extra.push(target);
            }
        }
        documents.push((outcome.target.url(), doc));
    }
    (documents, extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use apiscout::{Classification, PathCandidate};

    fn reachable(base: &str, path: &str, body: &str) -> ProbeOutcome {
        ProbeOutcome {
            target: ProbeTarget::new(base, &PathCandidate::get(path)),
            status: Some(200),
            body: body.into(),
            elapsed: Duration::from_millis(5),
            classification: Classification::Reachable,
            error: None,
        }
    }

    const DOC: &str = r#"{"swagger": "2.0", "paths": {
        "/objects": {"get": {}},
        "/v1/currencies": {"get": {}},
        "/v1/objects/{name}": {"get": {}}
    }}"#;

    #[test]
    fn test_follow_documents_skips_already_probed() {
        let outcomes = vec![
            reachable("https://x/api", "/swagger.json", DOC),
            reachable("https://x/api", "/objects", "[]"),
        ];
        let (docs, extra) = follow_documents(&outcomes, 25);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, "https://x/api/swagger.json");
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].url(), "https://x/api/v1/currencies");
    }

    #[test]
    fn test_follow_documents_ignores_failures_and_plain_bodies() {
        let mut denied = reachable("https://x", "/swagger.json", DOC);
        denied.status = Some(401);
        denied.classification = Classification::AuthRequired;
        let outcomes = vec![denied, reachable("https://x", "/health", "OK")];

        let (docs, extra) = follow_documents(&outcomes, 25);
        assert!(docs.is_empty());
        assert!(extra.is_empty());
    }

    #[test]
    fn test_follow_documents_dedups_across_documents() {
        let outcomes = vec![
            reachable("https://x", "/a.json", DOC),
            reachable("https://x", "/b.json", DOC),
        ];
        let (docs, extra) = follow_documents(&outcomes, 25);
        assert_eq!(docs.len(), 2);
        assert_eq!(extra.len(), 2);
    }
}
