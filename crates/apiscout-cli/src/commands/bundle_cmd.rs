//! `apiscout bundle`: structural checks on the client bundle.

use std::path::Path;

use anyhow::{bail, Result};

use crate::bundle::ArtifactStructuralValidator;
use crate::config::Config;
use crate::output;
use crate::report::{ReportSink, Verdict};

pub fn run(config: &Config, root: Option<&Path>) -> Result<Verdict> {
    let Some(bundle) = &config.bundle else {
        bail!("no `bundle` section in the config");
    };

    let mut validator =
        ArtifactStructuralValidator::new(bundle).with_secrets(&config.auth.secrets());
    if let Some(root) = root {
        validator = validator.with_root(root);
    }

    let mut sink = ReportSink::interactive();
    validator.validate(&mut sink);
    Ok(finish(&sink, config))
}

/// Print the summary (or JSON) for a finished sink and grade it.
pub fn finish(sink: &ReportSink, config: &Config) -> Verdict {
    let summary = sink.summary(&config.thresholds);
    if output::is_json() {
        output::print_json(&sink.to_json(&config.thresholds));
    } else if !output::is_quiet() {
        let failures: Vec<_> = sink.failures().collect();
        print!(
            "{}",
            output::render_summary(&summary, &failures, sink.warnings())
        );
    }
    summary.verdict
}
