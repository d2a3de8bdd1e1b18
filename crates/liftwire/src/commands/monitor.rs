//! `liftwire monitor`: subscribe, then print events until a limit or Ctrl-C.

use std::time::Duration;

use chrono::Local;
use liftwire_api::InboundFrame;
use liftwire_core::{ElevatorDriver, SubscribeRequest};
use serde_json::Value;
use tokio::time::Instant;

use crate::cli::{GlobalOpts, MonitorArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle<D: ElevatorDriver>(
    driver: &D,
    args: MonitorArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let req = SubscribeRequest {
        subtopics: args.topics,
        duration: args.duration,
        sub: args.sub,
    };
    let frame = driver.subscribe(&req).await?;
    util::ensure_success(&frame)?;
    util::status_line(
        global,
        &format!(
            "subscribed to {} for {}s, waiting up to {}s (Ctrl-C to stop)",
            req.subtopics.join(", "),
            req.effective_duration(),
            args.wait
        ),
    );

    let deadline = Instant::now() + Duration::from_secs(args.wait);
    let mut seen = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while args.count.is_none_or(|max| seen < max) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        tokio::select! {
            event = driver.next_event(remaining) => match event {
                Some(event) => {
                    seen += 1;
                    output::print_output(&render_event(global.output, &event), global.quiet);
                }
                None => break,
            },
            _ = &mut ctrl_c => break,
        }
    }

    tracing::info!(events = seen, "monitor finished");
    util::status_line(global, &format!("{seen} event(s) received"));
    Ok(())
}

/// One line per event for tables and plain text, one document otherwise.
fn render_event(format: OutputFormat, event: &InboundFrame) -> String {
    let mut value = event.to_value();
    if event.late {
        if let Value::Object(ref mut map) = value {
            map.insert("late".into(), Value::Bool(true));
        }
    }

    match format {
        OutputFormat::Table | OutputFormat::Plain | OutputFormat::Markdown => {
            let topic = event
                .extra
                .get("subtopic")
                .and_then(Value::as_str)
                .or(event.call_type.as_deref())
                .unwrap_or("event");
            let body = event.body().map(output::compact_value).unwrap_or_default();
            let late = if event.late { " (late)" } else { "" };
            format!("[{}] {topic}{late} {body}", Local::now().format("%H:%M:%S"))
        }
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(&value),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(&value)),
    }
}
