//! `apiscout check`: bundle, token endpoint, and API surface in one graded
//! run.

use anyhow::Result;

use apiscout::Classification;

use crate::bundle::ArtifactStructuralValidator;
use crate::config::Config;
use crate::report::{ReportSink, Verdict};

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub follow_docs: bool,
    pub skip_bundle: bool,
}

pub async fn run(config: &Config, opts: CheckOptions) -> Result<Verdict> {
    config.auth.validate()?;
    config.discovery.validate()?;

    let mut sink = ReportSink::interactive();
    let negotiated = collect(config, &opts, &mut sink).await?;
    let verdict = super::bundle_cmd::finish(&sink, config);
    // Without a credential nothing downstream was checked.
    Ok(if negotiated { verdict } else { Verdict::Fail })
}

/// Record every check into `sink`. Returns whether negotiation succeeded.
pub async fn collect(config: &Config, opts: &CheckOptions, sink: &mut ReportSink) -> Result<bool> {
    if !opts.skip_bundle {
        if let Some(bundle) = &config.bundle {
            ArtifactStructuralValidator::new(bundle)
                .with_secrets(&config.auth.secrets())
                .validate(sink);
        }
    }

    let transport = super::transport(config)?;
    let negotiator = super::negotiator(config, transport.clone());

    sink.section("Authentication");
    if config.auth.preflight {
        let pre = negotiator.preflight().await;
        let detail = match pre.status {
            Some(s) => format!("HTTP {s} from {}", pre.url),
            None => format!("no response from {}", pre.url),
        };
        sink.check("token endpoint reachable", pre.is_accessible(), detail);
    }

    let negotiated = match super::acquire(&negotiator, config).await? {
        Ok(n) => {
            for attempt in &n.trail {
                sink.warn(format!("variant {} rejected: {}", attempt.variant, attempt.error));
            }
            sink.check(
                "credential negotiation",
                true,
                format!("accepted `{}`, token {}", n.variant, n.credential.preview()),
            );
            n
        }
        Err(failure) => {
            for attempt in &failure.attempts {
                sink.warn(format!("variant {} rejected: {}", attempt.variant, attempt.error));
            }
            sink.fail("credential negotiation", failure.to_string());
            return Ok(false);
        }
    };

    let follow = opts.follow_docs || config.discovery.follow_docs;
    let survey =
        super::discover::survey(&config.discovery, follow, transport, &negotiated.credential).await;

    sink.section("API endpoints");
    for outcome in &survey.report.outcomes {
        let detail = match (outcome.status, &outcome.error) {
            (_, Some(err)) => err.clone(),
            (Some(status), None) if outcome.classification == Classification::Reachable => {
                format!("HTTP {status}")
            }
            (Some(status), None) => format!("HTTP {status} ({})", outcome.classification),
            (None, None) => outcome.classification.to_string(),
        };
        sink.check(outcome.target.to_string(), outcome.is_reachable(), detail);
    }
    for (url, doc) in &survey.documents {
        tracing::info!(url = %url, paths = doc.paths.len(), "followed API document");
    }
    Ok(true)
}
