//! Endpoint matrix probing.
//!
//! Visits every (base URL, path) cell with the negotiated credential. There
//! is no early exit: the goal is a complete map of the surface, so a failing
//! cell is just another data point.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use crate::classifier::classify;
use crate::transport::{Outcome, Transport, TransportRequest};
use crate::types::{Credential, PathCandidate, ProbeOutcome, ProbeTarget};

/// Probes get 10 seconds each.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// In-flight probes at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct ProberConfig {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Build the discovery matrix: base URLs outer, paths inner.
pub fn targets<S: AsRef<str>>(base_urls: &[S], paths: &[PathCandidate]) -> Vec<ProbeTarget> {
    base_urls
        .iter()
        .flat_map(|base| paths.iter().map(move |p| ProbeTarget::new(base.as_ref(), p)))
        .collect()
}

/// Issues one authenticated request per [`ProbeTarget`].
pub struct EndpointMatrixProber {
    config: ProberConfig,
    transport: Arc<dyn Transport>,
}

impl EndpointMatrixProber {
    pub fn new(config: ProberConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Probe the full `base_urls` x `paths` matrix.
    pub async fn scan<S: AsRef<str>>(
        &self,
        credential: &Credential,
        base_urls: &[S],
        paths: &[PathCandidate],
    ) -> Vec<ProbeOutcome> {
        let matrix = targets(base_urls, paths);
        self.probe(credential, &matrix).await
    }

    /// Probe `targets` with bounded concurrency.
    ///
    /// The output has exactly one outcome per target, in input order,
    /// whatever order the responses arrive in.
    pub async fn probe(&self, credential: &Credential, targets: &[ProbeTarget]) -> Vec<ProbeOutcome> {
        let concurrency = self.config.concurrency.max(1);
        let authorization = credential.authorization();

        tracing::info!(
            targets = targets.len(),
            concurrency,
            "probing endpoint matrix"
        );

        let outcomes: Vec<ProbeOutcome> = stream::iter(targets.iter())
            .map(|target| self.probe_one(target, &authorization))
            .buffered(concurrency)
            .collect()
            .await;

        tracing::info!(
            reachable = outcomes.iter().filter(|o| o.is_reachable()).count(),
            total = outcomes.len(),
            "matrix probe complete"
        );

        outcomes
    }

    async fn probe_one(&self, target: &ProbeTarget, authorization: &str) -> ProbeOutcome {
        let request = TransportRequest::new(target.method, target.url(), self.config.timeout)
            .header("Authorization", authorization)
            .header("Accept", "application/json");

        let started = Instant::now();
        let outcome = self.transport.execute(request).await;
        let classification = classify(&outcome);

        tracing::debug!(
            probe = %target,
            status = ?outcome.status(),
            %classification,
            "probe"
        );

        match outcome {
            Outcome::Response {
                status,
                body,
                elapsed,
            } => ProbeOutcome {
                target: target.clone(),
                status: Some(status),
                body,
                elapsed,
                classification,
                error: None,
            },
            Outcome::TransportFailure { kind, message } => ProbeOutcome {
                target: target.clone(),
                status: None,
                body: String::new(),
                elapsed: started.elapsed(),
                classification,
                error: Some(format!("{kind}: {message}")),
            },
        }
    }
}
