//! `apiscout negotiate`: find a parameter variant the token endpoint accepts.

use anyhow::Result;

use apiscout::NegotiationFailure;

use crate::config::Config;
use crate::output;
use crate::report::Verdict;

pub async fn run(config: &Config) -> Result<Verdict> {
    config.auth.validate()?;
    let negotiator = super::negotiator(config, super::transport(config)?);

    let preflight = if config.auth.preflight {
        let pre = negotiator.preflight().await;
        if output::is_human() {
            println!("{}", output::render_preflight(&pre));
            println!();
        }
        Some(pre)
    } else {
        None
    };

    match super::acquire(&negotiator, config).await? {
        Ok(negotiated) => {
            if output::is_json() {
                let mut v = output::negotiated_json(&negotiated);
                v["ok"] = true.into();
                v["preflight"] = serde_json::to_value(&preflight)?;
                output::print_json(&v);
            } else if !output::is_quiet() {
                print!("{}", output::render_negotiated(&negotiated));
            }
            Ok(Verdict::Pass)
        }
        Err(failure) => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "ok": false,
                    "preflight": preflight,
                    "error": failure.to_string(),
                    "attempts": failure.attempts,
                }));
            } else {
                report_failure(&failure);
            }
            Ok(Verdict::Fail)
        }
    }
}

/// Human rendering of an exhausted ladder. Printed even with `--quiet`: it
/// is the only explanation for the non-zero exit.
pub fn report_failure(failure: &NegotiationFailure) {
    println!("Credential negotiation");
    print!("{}", output::render_trail(&failure.attempts));
    println!();
    println!("  {failure}");
    if failure.attempts.iter().any(|a| a.error.is_contract_mismatch()) {
        println!("  At least one variant got HTTP 200 without a token; check the token URL.");
    }
}
