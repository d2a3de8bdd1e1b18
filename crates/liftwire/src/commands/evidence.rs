//! `liftwire evidence`: read back the append-only evidence log.

use liftwire_api::evidence::read_log;
use liftwire_api::{EvidenceEntry, Phase};
use serde_json::Value;
use tabled::Tabled;

use crate::cli::{EvidenceArgs, GlobalOpts, PhaseFilter};
use crate::config::{self, evidence_path, load_config};
use crate::error::CliError;
use crate::output;

const DETAIL_WIDTH: usize = 80;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Time")]
    ts: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Request")]
    request_id: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&EvidenceEntry> for EntryRow {
    fn from(entry: &EvidenceEntry) -> Self {
        let field = |key: &str| entry.fields.get(key).map(output::compact_value).unwrap_or_default();

        let detail = ["status", "kind", "url", "frame", "message", "body"]
            .iter()
            .find_map(|key| entry.fields.get(*key))
            .map(output::compact_value)
            .unwrap_or_default();

        Self {
            ts: entry.ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            phase: entry.phase.to_string(),
            channel: field("channel"),
            request_id: field("request_id"),
            detail: truncate(&detail, DETAIL_WIDTH),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let head: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{head}...")
}

fn matches_phase(entry: &EvidenceEntry, filter: Option<PhaseFilter>) -> bool {
    match filter {
        None => true,
        Some(PhaseFilter::Request) => entry.phase == Phase::Request,
        Some(PhaseFilter::Response) => entry.phase == Phase::Response,
        Some(PhaseFilter::Event) => entry.phase == Phase::Event,
    }
}

/// Last `tail` entries of the requested phase, oldest first.
fn select(entries: Vec<EvidenceEntry>, filter: Option<PhaseFilter>, tail: usize) -> Vec<EvidenceEntry> {
    let mut picked: Vec<_> = entries
        .into_iter()
        .filter(|e| matches_phase(e, filter))
        .collect();
    let skip = picked.len().saturating_sub(tail);
    picked.drain(..skip);
    picked
}

pub fn handle(args: &EvidenceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = match args.file {
        Some(ref path) => path.clone(),
        None => {
            let cfg = load_config()?;
            let name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.get(&name).cloned().unwrap_or_default();
            evidence_path(&profile)
        }
    };

    let entries = match read_log(&path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if !global.quiet {
                eprintln!("No evidence recorded yet at {}", path.display());
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let entries = select(entries, args.phase, args.tail);
    let out = output::render_list(global.output, &entries, |e| EntryRow::from(e), |e| {
        serde_json::to_value(e)
            .map(|v: Value| v.to_string())
            .unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(phase: Phase, fields: Value) -> EvidenceEntry {
        EvidenceEntry::new(phase, fields)
    }

    #[test]
    fn tail_keeps_the_newest_matching_entries() {
        let entries = vec![
            entry(Phase::Request, json!({ "request_id": 1 })),
            entry(Phase::Response, json!({ "request_id": 1 })),
            entry(Phase::Request, json!({ "request_id": 2 })),
            entry(Phase::Event, json!({ "kind": "disconnected" })),
            entry(Phase::Request, json!({ "request_id": 3 })),
        ];

        let picked = select(entries, Some(PhaseFilter::Request), 2);
        let ids: Vec<_> = picked.iter().map(|e| e.fields["request_id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3)]);
    }

    #[test]
    fn row_prefers_status_for_detail() {
        let row = EntryRow::from(&entry(
            Phase::Response,
            json!({ "channel": "ws", "request_id": 9, "status": 201, "frame": { "x": 1 } }),
        ));
        assert_eq!(row.channel, "ws");
        assert_eq!(row.request_id, "9");
        assert_eq!(row.detail, "201");
    }

    #[test]
    fn long_details_are_truncated() {
        let s = "x".repeat(200);
        let t = truncate(&s, 10);
        assert_eq!(t.chars().count(), 10);
        assert!(t.ends_with("..."));
    }
}
