//! Output formatting: table, JSON, YAML, plain, Markdown.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one value per line.

use std::io::{self, IsTerminal, Write};

use liftwire_api::InboundFrame;
use liftwire_core::Outcome;
use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Outcome label, colored when `color` is set.
pub fn outcome_label(outcome: Outcome, color: bool) -> String {
    let label = outcome.to_string().to_uppercase();
    if !color {
        return label;
    }
    match outcome {
        Outcome::Pass => label.green().bold().to_string(),
        Outcome::Fail => label.red().bold().to_string(),
        Outcome::Error => label.magenta().bold().to_string(),
        Outcome::Skipped => label.yellow().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Markdown => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Table::new(rows).with(Style::markdown()).to_string()
        }
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`; Markdown wraps the JSON in a fenced block.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Markdown => format!("```json\n{}\n```", render_json_pretty(data)),
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Response frames ──────────────────────────────────────────────────

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Render a response frame: envelope fields, then one row per body key.
pub fn render_frame(format: OutputFormat, frame: &InboundFrame) -> String {
    render_single(format, &frame.to_value(), |_| frame_detail(frame), |_| frame_plain(frame))
}

fn frame_detail(frame: &InboundFrame) -> String {
    let mut rows = Vec::new();
    let mut push = |field: &str, value: Option<String>| {
        if let Some(value) = value {
            rows.push(FieldRow {
                field: field.to_owned(),
                value,
            });
        }
    };

    push("type", frame.message_type.clone());
    push("callType", frame.call_type.clone());
    push("status", frame.status_code().map(|s| s.to_string()));
    push("requestId", frame.correlation_id().map(|id| id.to_string()));
    if frame.late {
        push("late", Some("true".into()));
    }

    match frame.body() {
        Some(Value::Object(map)) => {
            for (key, value) in map {
                push(key, Some(compact_value(value)));
            }
        }
        Some(other) => push("body", Some(compact_value(other))),
        None => {}
    }

    render_table(&rows)
}

/// Status code for scripting, or the body when there is none.
fn frame_plain(frame: &InboundFrame) -> String {
    frame.status_code().map_or_else(
        || frame.body().map(compact_value).unwrap_or_default(),
        |s| s.to_string(),
    )
}

/// Strings unquoted, everything else as compact JSON.
pub fn compact_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Format-specific renderers ────────────────────────────────────────

pub(crate) fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Pretty-printed JSON.
pub(crate) fn render_json_pretty<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).expect("serialization should not fail")
}

/// Compact single-line JSON.
pub(crate) fn render_json_compact<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string(data).expect("serialization should not fail")
}

/// YAML output.
pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).expect("serialization should not fail")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame() -> InboundFrame {
        serde_json::from_value(json!({
            "type": "lift-call-api-v2",
            "callType": "action",
            "statusCode": 201,
            "requestId": 77,
            "data": { "session_id": 1000, "success": true }
        }))
        .unwrap_or_else(|e| panic!("fixture: {e}"))
    }

    #[test]
    fn table_lists_envelope_and_body_fields() {
        let out = render_frame(OutputFormat::Table, &frame());
        assert!(out.contains("callType"));
        assert!(out.contains("201"));
        assert!(out.contains("session_id"));
        assert!(out.contains("1000"));
    }

    #[test]
    fn plain_is_the_status_code() {
        assert_eq!(render_frame(OutputFormat::Plain, &frame()), "201");
    }

    #[test]
    fn markdown_fences_json() {
        let out = render_frame(OutputFormat::Markdown, &frame());
        assert!(out.starts_with("```json\n"));
        assert!(out.ends_with("```"));
    }

    #[test]
    fn outcome_without_color_is_plain_text() {
        assert_eq!(outcome_label(Outcome::Skipped, false), "SKIPPED");
    }
}
