// ── Validation results and reports ──
//
// One `TestResult` per check; `SuiteReport` aggregates them and renders
// Markdown for humans and JSON for machines.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    /// The check could not run to completion (connection, timeout, auth).
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: u32,
    pub name: String,
    pub outcome: Outcome,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ── Statistics ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    /// Passed over executed (total minus skipped), in percent.
    pub pass_rate: f64,
    pub min_ms: Option<u64>,
    pub mean_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl SuiteStats {
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn from_results(results: &[TestResult]) -> Self {
        let count = |o: Outcome| results.iter().filter(|r| r.outcome == o).count();
        let passed = count(Outcome::Pass);
        let skipped = count(Outcome::Skipped);
        let executed = results.len() - skipped;

        let latencies: Vec<u64> = results
            .iter()
            .filter(|r| r.outcome != Outcome::Skipped)
            .map(|r| u64::try_from(r.duration.as_millis()).unwrap_or(u64::MAX))
            .collect();

        let mean_ms = if latencies.is_empty() {
            None
        } else {
            let sum: u128 = latencies.iter().map(|&l| u128::from(l)).sum();
            u64::try_from(sum / latencies.len() as u128).ok()
        };

        Self {
            total: results.len(),
            passed,
            failed: count(Outcome::Fail),
            errored: count(Outcome::Error),
            skipped,
            pass_rate: if executed == 0 {
                0.0
            } else {
                passed as f64 * 100.0 / executed as f64
            },
            min_ms: latencies.iter().min().copied(),
            mean_ms,
            max_ms: latencies.iter().max().copied(),
        }
    }
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub building_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
    pub stats: SuiteStats,
}

impl SuiteReport {
    pub fn new(
        building_id: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        results: Vec<TestResult>,
    ) -> Self {
        let stats = SuiteStats::from_results(&results);
        Self {
            building_id: building_id.into(),
            started_at,
            finished_at,
            results,
            stats,
        }
    }

    /// `true` when no check failed or errored.
    pub fn is_success(&self) -> bool {
        self.stats.failed == 0 && self.stats.errored == 0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_markdown(&self) -> String {
        let s = &self.stats;
        let mut out = String::new();

        let _ = writeln!(out, "# Validation report: {}\n", self.building_id);
        let _ = writeln!(out, "- Started: {}", self.started_at.to_rfc3339());
        let _ = writeln!(out, "- Finished: {}", self.finished_at.to_rfc3339());
        let _ = writeln!(
            out,
            "- Result: {} passed, {} failed, {} errors, {} skipped ({:.1}% pass rate)",
            s.passed, s.failed, s.errored, s.skipped, s.pass_rate
        );
        if let (Some(min), Some(mean), Some(max)) = (s.min_ms, s.mean_ms, s.max_ms) {
            let _ = writeln!(out, "- Latency: min {min} ms, mean {mean} ms, max {max} ms");
        }

        out.push_str("\n| # | Check | Outcome | Duration | Detail |\n");
        out.push_str("|---|---|---|---|---|\n");
        for r in &self.results {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} ms | {} |",
                r.id,
                r.name,
                r.outcome.to_string().to_uppercase(),
                r.duration.as_millis(),
                escape_cell(&r.detail),
            );
        }
        out
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}
