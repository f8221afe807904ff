use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::domain::interaction::InteractionRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("could not serialize interaction record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not append to `{path}`: {source}")]
    Append { path: PathBuf, source: std::io::Error },
}

/// Append-only sink for interaction records. Implementations must serialize
/// concurrent appends so every line lands as one complete record.
pub trait InteractionSink: Send + Sync {
    fn append(&self, record: &InteractionRecord) -> Result<(), SinkError>;
}

/// One JSON object per line, per-kind file under a fixed directory. Appends
/// hold an internal mutex and flush before returning, so a successful return
/// means the line is handed off to the OS and no two records interleave.
pub struct JsonlInteractionSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlInteractionSink {
    pub fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    fn path_for(&self, record: &InteractionRecord) -> PathBuf {
        self.dir.join(format!("{}.jsonl", record.log_stem()))
    }
}

impl InteractionSink for JsonlInteractionSink {
    fn append(&self, record: &InteractionRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        let path = self.path_for(record);

        let guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| {
                writeln!(file, "{line}")?;
                file.flush()
            });
        drop(guard);

        result.map_err(|source| SinkError::Append { path, source })
    }
}

/// Test double that keeps appended records in memory.
#[derive(Clone, Default)]
pub struct InMemoryInteractionSink {
    records: Arc<Mutex<Vec<InteractionRecord>>>,
}

impl InMemoryInteractionSink {
    pub fn records(&self) -> Vec<InteractionRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl InteractionSink for InMemoryInteractionSink {
    fn append(&self, record: &InteractionRecord) -> Result<(), SinkError> {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Utc;
    use tempfile::TempDir;

    use super::{InMemoryInteractionSink, InteractionSink, JsonlInteractionSink};
    use crate::domain::interaction::InteractionRecord;

    #[test]
    fn appends_one_parseable_line_per_record_to_the_kind_file() {
        let dir = TempDir::new().expect("temp dir");
        let sink = JsonlInteractionSink::create(dir.path()).expect("sink dir");

        sink.append(&lead("Dana Reeve", "dana@example.com")).expect("first append");
        sink.append(&lead("Sam Ortiz", "sam@example.com")).expect("second append");

        let raw = fs::read_to_string(dir.path().join("leads.jsonl")).expect("leads file");
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        for line in &lines {
            let value: serde_json::Value = serde_json::from_str(line).expect("self-contained line");
            assert_eq!(value["kind"], "lead");
            assert!(value["recorded_at"].is_string());
        }
        assert!(raw.contains("dana@example.com"));
    }

    #[test]
    fn record_kinds_land_in_separate_files() {
        let dir = TempDir::new().expect("temp dir");
        let sink = JsonlInteractionSink::create(dir.path()).expect("sink dir");

        sink.append(&lead("Dana Reeve", "dana@example.com")).expect("lead");
        sink.append(&InteractionRecord::UnresolvedQuestion {
            question: "do you restore antique clocks?".to_string(),
            recorded_at: Utc::now(),
        })
        .expect("question");

        assert!(dir.path().join("leads.jsonl").exists());
        assert!(dir.path().join("feedback.jsonl").exists());
        assert!(!dir.path().join("service_feedback.jsonl").exists());
    }

    #[test]
    fn optional_fields_are_omitted_from_the_line() {
        let dir = TempDir::new().expect("temp dir");
        let sink = JsonlInteractionSink::create(dir.path()).expect("sink dir");

        sink.append(&InteractionRecord::ServiceFeedback {
            email: "dana@example.com".to_string(),
            name: "Dana Reeve".to_string(),
            service_type: "repair".to_string(),
            satisfaction: "happy".to_string(),
            comments: None,
            recorded_at: Utc::now(),
        })
        .expect("append");

        let raw =
            fs::read_to_string(dir.path().join("service_feedback.jsonl")).expect("feedback file");
        assert!(!raw.contains("comments"));
    }

    #[test]
    fn in_memory_sink_records_in_append_order() {
        let sink = InMemoryInteractionSink::default();
        sink.append(&lead("Dana Reeve", "dana@example.com")).expect("first");
        sink.append(&lead("Sam Ortiz", "sam@example.com")).expect("second");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[0], InteractionRecord::Lead { name, .. } if name == "Dana Reeve"));
    }

    fn lead(name: &str, email: &str) -> InteractionRecord {
        InteractionRecord::Lead {
            name: name.to_string(),
            email: email.to_string(),
            intent: "purchase".to_string(),
            note: None,
            recorded_at: Utc::now(),
        }
    }
}
