//! `liftwire validate`: run the integration checks and report.

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use liftwire_core::{Check, ElevatorDriver, SuiteReport, TestResult, run_suite};
use tabled::Tabled;

use crate::cli::{GlobalOpts, OutputFormat, ValidateArgs};
use crate::config::{self, ResolvedProfile};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    id: u32,
    #[tabled(rename = "Check")]
    name: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Time")]
    duration: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn progress_bar(global: &GlobalOpts) -> ProgressBar {
    if global.quiet || global.output != OutputFormat::Table {
        return ProgressBar::hidden();
    }
    let len = u64::try_from(Check::ALL.len()).unwrap_or(u64::MAX);
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

pub async fn handle<D: ElevatorDriver>(
    driver: &D,
    args: &ValidateArgs,
    resolved: &ResolvedProfile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let suite = config::suite_config(resolved, Duration::from_secs(args.event_wait));
    let color = output::should_color(global.color);
    let pb = progress_bar(global);

    let report = run_suite(driver, &suite, |result: &TestResult| {
        pb.inc(1);
        pb.println(format!(
            "{:>2}. {:<28} {}",
            result.id,
            result.name,
            output::outcome_label(result.outcome, color)
        ));
    })
    .await;
    pb.finish_and_clear();

    if let Some(ref path) = args.report {
        write_report(&report, path)?;
        tracing::info!(path = %path.display(), "report written");
    }

    output::print_output(&render_report(global.output, &report, color), global.quiet);

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::SuiteFailed {
            failed: report.stats.failed,
            errored: report.stats.errored,
        })
    }
}

/// Markdown for `.md` paths, pretty JSON for anything else.
fn write_report(report: &SuiteReport, path: &Path) -> Result<(), CliError> {
    let is_markdown = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
    let body = if is_markdown {
        report.to_markdown()
    } else {
        report.to_json()?
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(())
}

fn render_report(format: OutputFormat, report: &SuiteReport, color: bool) -> String {
    match format {
        OutputFormat::Markdown => report.to_markdown(),
        OutputFormat::Table => {
            let s = &report.stats;
            let rows: Vec<ResultRow> = report
                .results
                .iter()
                .map(|r| ResultRow {
                    id: r.id,
                    name: r.name.clone(),
                    outcome: output::outcome_label(r.outcome, color),
                    duration: format!("{} ms", r.duration.as_millis()),
                    detail: r.detail.clone(),
                })
                .collect();
            format!(
                "{}\n{} passed, {} failed, {} errors, {} skipped ({:.1}% pass rate)",
                output::render_table(&rows),
                s.passed,
                s.failed,
                s.errored,
                s.skipped,
                s.pass_rate
            )
        }
        OutputFormat::Plain => report
            .results
            .iter()
            .map(|r| format!("{} {}", r.id, r.outcome))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Json => output::render_json_pretty(report),
        OutputFormat::JsonCompact => output::render_json_compact(report),
        OutputFormat::Yaml => output::render_yaml(report),
    }
}

#[cfg(test)]
mod tests {
    use liftwire_core::{DriverTarget, MockDriver, messages::call_type};
    use serde_json::json;

    use super::*;
    use crate::commands::util;
    use crate::config::Profile;

    fn resolved() -> ResolvedProfile {
        ResolvedProfile {
            name: "default".into(),
            profile: Profile::default(),
            timeout: 30,
            evidence_capacity: 16,
        }
    }

    fn args(report: Option<std::path::PathBuf>) -> ValidateArgs {
        ValidateArgs {
            report,
            event_wait: 0,
        }
    }

    #[tokio::test]
    async fn offline_suite_passes_and_writes_markdown() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("out").join("report.md");
        let driver = MockDriver::new(DriverTarget::new("b1", "1"));

        handle(&driver, &args(Some(path.clone())), &resolved(), &util::quiet_globals())
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let md = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{e}"));
        assert!(md.starts_with("# Validation report: building:b1"));
        assert!(md.contains("| 9 | Cancel call | PASS |"));
    }

    #[tokio::test]
    async fn rejected_check_is_a_suite_failure() {
        let driver = MockDriver::new(DriverTarget::new("b1", "1"));
        driver.respond_with(call_type::PING, 500, json!({ "error": "down" }));

        let err = handle(&driver, &args(None), &resolved(), &util::quiet_globals())
            .await
            .err()
            .unwrap_or_else(|| panic!("suite should fail"));
        assert!(matches!(err, CliError::SuiteFailed { failed: 1, errored: 0 }));
        assert_eq!(err.exit_code(), crate::error::exit_code::SUITE_FAILED);
    }

    #[tokio::test]
    async fn json_report_for_other_extensions() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("report.json");
        let driver = MockDriver::new(DriverTarget::new("b1", "1"));

        handle(&driver, &args(Some(path.clone())), &resolved(), &util::quiet_globals())
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{e}")))
                .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(v["stats"]["total"], 9);
        assert_eq!(v["results"][3]["outcome"], "pass");
    }
}
