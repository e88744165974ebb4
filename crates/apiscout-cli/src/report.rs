//! Pass/fail bookkeeping shared by every command.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Thresholds;
use crate::output;

/// One recorded check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub section: String,
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// Grade for a success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

impl Tier {
    pub fn grade(rate: f64, thresholds: &Thresholds) -> Self {
        if rate >= thresholds.excellent {
            Tier::Excellent
        } else if rate >= thresholds.good {
            Tier::Good
        } else if rate >= thresholds.needs_improvement {
            Tier::NeedsImprovement
        } else {
            Tier::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Excellent => "EXCELLENT",
            Tier::Good => "GOOD",
            Tier::NeedsImprovement => "NEEDS IMPROVEMENT",
            Tier::Poor => "POOR",
        }
    }
}

/// Whether a run is good enough for a zero exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn from_rate(rate: f64, acceptable: f64) -> Self {
        if rate >= acceptable {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub run: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percent, 0 when nothing ran.
    pub success_rate: f64,
    pub duration_secs: f64,
    pub tier: Tier,
    pub verdict: Verdict,
}

/// Collects check results and warnings, optionally echoing them as they
/// arrive.
#[derive(Debug)]
pub struct ReportSink {
    checks: Vec<CheckResult>,
    warnings: Vec<String>,
    section: String,
    started: Instant,
    started_at: DateTime<Utc>,
    echo: bool,
}

impl Default for ReportSink {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ReportSink {
    pub fn new(echo: bool) -> Self {
        Self {
            checks: Vec::new(),
            warnings: Vec::new(),
            section: String::new(),
            started: Instant::now(),
            started_at: Utc::now(),
            echo,
        }
    }

    /// Sink that prints to stdout unless `--json` or `--quiet` is active.
    pub fn interactive() -> Self {
        Self::new(!output::is_json() && !output::is_quiet())
    }

    /// Start a new section; subsequent checks are filed under it.
    pub fn section(&mut self, name: impl Into<String>) {
        self.section = name.into();
        if self.echo {
            println!();
            println!("{}", self.section);
            println!("{}", "-".repeat(self.section.chars().count()));
        }
    }

    pub fn check(&mut self, name: impl Into<String>, passed: bool, detail: impl Into<String>) {
        let result = CheckResult {
            section: self.section.clone(),
            name: name.into(),
            passed,
            detail: detail.into(),
        };
        if self.echo {
            println!("{}", output::check_line(&result));
        }
        self.checks.push(result);
    }

    pub fn pass(&mut self, name: impl Into<String>) {
        self.check(name, true, "");
    }

    pub fn fail(&mut self, name: impl Into<String>, detail: impl Into<String>) {
        self.check(name, false, detail);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.echo {
            println!("[??] {message}");
        }
        self.warnings.push(message);
    }

    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn summary(&self, thresholds: &Thresholds) -> Summary {
        let run = self.checks.len();
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let success_rate = if run == 0 {
            0.0
        } else {
            passed as f64 * 100.0 / run as f64
        };
        Summary {
            run,
            passed,
            failed: run - passed,
            success_rate,
            duration_secs: self.started.elapsed().as_secs_f64(),
            tier: Tier::grade(success_rate, thresholds),
            verdict: Verdict::from_rate(success_rate, thresholds.acceptable),
        }
    }

    pub fn to_json(&self, thresholds: &Thresholds) -> serde_json::Value {
        serde_json::json!({
            "started_at": self.started_at,
            "summary": self.summary(thresholds),
            "checks": self.checks,
            "warnings": self.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let t = Thresholds::default();
        assert_eq!(Tier::grade(100.0, &t), Tier::Excellent);
        assert_eq!(Tier::grade(90.0, &t), Tier::Excellent);
        assert_eq!(Tier::grade(89.9, &t), Tier::Good);
        assert_eq!(Tier::grade(75.0, &t), Tier::Good);
        assert_eq!(Tier::grade(50.0, &t), Tier::NeedsImprovement);
        assert_eq!(Tier::grade(49.9, &t), Tier::Poor);
        assert_eq!(Tier::grade(0.0, &t), Tier::Poor);
    }

    #[test]
    fn test_summary_counts_and_verdict() {
        let mut sink = ReportSink::default();
        sink.section("Files");
        sink.pass("manifest.json exists");
        sink.pass("popup.html exists");
        sink.pass("icons/ exists");
        sink.fail("styles/ exists", "missing");
        sink.warn("content.js is 120 KB");

        let s = sink.summary(&Thresholds::default());
        assert_eq!(s.run, 4);
        assert_eq!(s.passed, 3);
        assert_eq!(s.failed, 1);
        assert_eq!(s.success_rate, 75.0);
        assert_eq!(s.tier, Tier::Good);
        assert_eq!(s.verdict, Verdict::Pass);
        assert_eq!(s.verdict.exit_code(), 0);

        let failures: Vec<_> = sink.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].section, "Files");
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn test_empty_sink_fails() {
        let s = ReportSink::default().summary(&Thresholds::default());
        assert_eq!(s.success_rate, 0.0);
        assert_eq!(s.tier, Tier::Poor);
        assert_eq!(s.verdict.exit_code(), 1);
    }

    #[test]
    fn test_custom_acceptable_threshold() {
        let mut sink = ReportSink::default();
        sink.pass("a");
        sink.fail("b", "");
        let strict = Thresholds::default();
        let lenient = Thresholds {
            acceptable: 50.0,
            ..Thresholds::default()
        };
        assert_eq!(sink.summary(&strict).verdict, Verdict::Fail);
        assert_eq!(sink.summary(&lenient).verdict, Verdict::Pass);
    }

    #[test]
    fn test_json_shape() {
        let mut sink = ReportSink::default();
        sink.section("Auth");
        sink.fail("token", "HTTP 401");
        let v = sink.to_json(&Thresholds::default());
        assert_eq!(v["summary"]["tier"], "poor");
        assert_eq!(v["summary"]["verdict"], "fail");
        assert_eq!(v["checks"][0]["section"], "Auth");
        assert_eq!(v["checks"][0]["detail"], "HTTP 401");
        assert!(v["started_at"].as_str().unwrap().contains('T'));
    }
}
