//! Append-only evidence trail of every request, response, and event.
//!
//! Components never touch ambient state: they hold an [`EvidenceRecorder`]
//! that fans each entry out to the injected [`EvidenceSink`]s. Two sinks
//! ship with the crate: a bounded in-memory ring ([`MemoryEvidence`]) and an
//! append-only JSON-lines file ([`FileEvidence`]).
//!
//! Secrets are masked before an entry reaches any sink.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default number of entries kept by [`MemoryEvidence`].
pub const DEFAULT_RING_CAPACITY: usize = 500;

/// Keys whose values are masked wherever they appear.
const SENSITIVE_KEYS: &[&str] = &[
    "access_token",
    "accesstoken",
    "authorization",
    "client_secret",
    "password",
    "secret",
    "token",
];

// ── Entry ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Request,
    Response,
    Event,
}

/// One immutable line of evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub ts: DateTime<Utc>,
    pub phase: Phase,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EvidenceEntry {
    /// Build an entry stamped with the current time.
    ///
    /// Object `fields` are flattened into the entry; any other value is
    /// stored under `body`. Sensitive values are masked.
    pub fn new(phase: Phase, fields: Value) -> Self {
        let mut fields = match fields {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("body".into(), other);
                map
            }
        };
        for (key, value) in &mut fields {
            sanitize_entry(key, value);
        }
        Self {
            ts: Utc::now(),
            phase,
            fields,
        }
    }
}

// ── Sanitization ────────────────────────────────────────────────────

/// Mask a secret, keeping only the last four characters for correlation.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count < 12 {
        return "****".into();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}

/// Recursively mask every value stored under a sensitive key.
pub fn sanitize(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                sanitize_entry(key, v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize),
        _ => {}
    }
}

fn sanitize_entry(key: &str, value: &mut Value) {
    if SENSITIVE_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
        if let Value::String(s) = value {
            *value = Value::String(mask_secret(s));
        } else if !value.is_null() {
            *value = Value::String("****".into());
        }
    } else {
        sanitize(value);
    }
}

// ── Sink trait ──────────────────────────────────────────────────────

/// Destination for evidence entries. Implementations must not fail the
/// caller: write errors are logged and swallowed.
pub trait EvidenceSink: Send + Sync {
    fn record(&self, entry: &EvidenceEntry);
}

// ── MemoryEvidence ──────────────────────────────────────────────────

/// Bounded ring keeping the most recent entries.
pub struct MemoryEvidence {
    capacity: usize,
    entries: Mutex<VecDeque<EvidenceEntry>>,
}

impl MemoryEvidence {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the buffered entries, oldest first.
    pub fn snapshot(&self) -> Vec<EvidenceEntry> {
        self.entries
            .lock()
            .expect("evidence lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Phases of the buffered entries, oldest first.
    pub fn phases(&self) -> Vec<Phase> {
        self.entries
            .lock()
            .expect("evidence lock poisoned")
            .iter()
            .map(|e| e.phase)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("evidence lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryEvidence {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl EvidenceSink for MemoryEvidence {
    fn record(&self, entry: &EvidenceEntry) {
        let mut entries = self.entries.lock().expect("evidence lock poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
    }
}

// ── FileEvidence ────────────────────────────────────────────────────

/// Append-only JSON-lines writer. The file is never truncated or rewritten.
pub struct FileEvidence {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileEvidence {
    /// Open (or create) the log for appending, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EvidenceSink for FileEvidence {
    fn record(&self, entry: &EvidenceEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode evidence entry");
                return;
            }
        };
        let mut file = self.file.lock().expect("evidence file lock poisoned");
        if let Err(e) = writeln!(file, "{line}") {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to append evidence");
        }
    }
}

/// Read back a JSON-lines evidence log. Undecodable lines are skipped.
pub fn read_log(path: &Path) -> io::Result<Vec<EvidenceEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::debug!(error = %e, "skipping undecodable evidence line"),
        }
    }
    Ok(entries)
}

// ── Recorder ────────────────────────────────────────────────────────

/// Fan-out handle held by every component. Cheap to clone.
#[derive(Clone, Default)]
pub struct EvidenceRecorder {
    sinks: Vec<Arc<dyn EvidenceSink>>,
}

impl EvidenceRecorder {
    /// A recorder with no sinks: entries are built and dropped.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EvidenceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn record(&self, phase: Phase, fields: Value) {
        if self.sinks.is_empty() {
            return;
        }
        let entry = EvidenceEntry::new(phase, fields);
        for sink in &self.sinks {
            sink.record(&entry);
        }
    }
}

impl std::fmt::Debug for EvidenceRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceRecorder")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ring_keeps_most_recent_entries() {
        let ring = MemoryEvidence::new(3);
        for i in 0..5 {
            ring.record(&EvidenceEntry::new(Phase::Event, json!({ "n": i })));
        }
        let kept: Vec<_> = ring.snapshot().iter().map(|e| e.fields["n"].clone()).collect();
        assert_eq!(kept, vec![json!(2), json!(3), json!(4)]);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn secrets_are_masked_recursively() {
        let entry = EvidenceEntry::new(
            Phase::Response,
            json!({
                "status": 200,
                "body": {
                    "access_token": "eyJhbGciOiJIUzI1NiJ9.abcdef",
                    "token_type": "Bearer",
                    "nested": [{ "client_secret": "s3cr3t" }]
                }
            }),
        );
        let body = &entry.fields["body"];
        assert_eq!(body["access_token"], "****cdef");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["nested"][0]["client_secret"], "****");
        assert_eq!(entry.fields["status"], 200);
    }

    #[test]
    fn non_object_fields_land_under_body() {
        let entry = EvidenceEntry::new(Phase::Event, json!("raw"));
        assert_eq!(entry.fields["body"], "raw");
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("evidence.jsonl");

        let sink = FileEvidence::open(&path).unwrap();
        sink.record(&EvidenceEntry::new(Phase::Request, json!({ "id": 1 })));
        sink.record(&EvidenceEntry::new(Phase::Response, json!({ "id": 1 })));
        drop(sink);

        // Re-opening appends rather than truncating.
        let sink = FileEvidence::open(&path).unwrap();
        sink.record(&EvidenceEntry::new(Phase::Event, json!({ "id": 2 })));

        let entries = read_log(&path).unwrap();
        let phases: Vec<_> = entries.iter().map(|e| e.phase).collect();
        assert_eq!(phases, vec![Phase::Request, Phase::Response, Phase::Event]);
        assert_eq!(entries[2].fields["id"], 2);
    }

    #[test]
    fn recorder_fans_out_to_every_sink() {
        let a = Arc::new(MemoryEvidence::new(10));
        let b = Arc::new(MemoryEvidence::new(10));
        let recorder = EvidenceRecorder::new()
            .with_sink(a.clone())
            .with_sink(b.clone());

        recorder.record(Phase::Request, json!({ "x": 1 }));

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
