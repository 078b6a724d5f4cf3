//! Append-only activity log of annotator operations.
//!
//! The log is newline-delimited JSON. Opening a log appends an
//! `{"is_start": true}` record and closing it (explicitly or on drop) an
//! `{"is_end": true}` record; every tracked operation appends one record
//! with its name under `fn` and the tracked arguments. Each record also
//! carries `time` (UNIX seconds) and `human_time` (UTC).
//!
//! Write failures never reach the caller: they are reported through
//! `tracing` and the next append tries again.

mod analyze;
mod report;

pub use analyze::{analyze_logs, find_package_logs, read_activity_log, LogEvent, LogEventKind};
#[cfg(feature = "fuzzing")]
pub use analyze::fuzz_parse_activity_log;
pub use report::LogReport;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Format of the `human_time` field.
pub const HUMAN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// How a tracked argument is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extractor {
    /// The value as given.
    Raw,
    /// Only these keys of an object, or of each object in an array.
    Fields(&'static [&'static str]),
    /// The number of elements of an array or keys of an object.
    Count,
}

impl Extractor {
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Extractor::Raw => value.clone(),
            Extractor::Fields(fields) => match value {
                Value::Array(items) => {
                    Value::Array(items.iter().map(|item| pick_fields(item, fields)).collect())
                }
                other => pick_fields(other, fields),
            },
            Extractor::Count => match value {
                Value::Array(items) => Value::from(items.len()),
                Value::Object(map) => Value::from(map.len()),
                Value::Null => Value::from(0),
                _ => Value::from(1),
            },
        }
    }
}

fn pick_fields(value: &Value, fields: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            fields
                .iter()
                .filter_map(|field| map.get(*field).map(|v| (field.to_string(), v.clone())))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// An operation name and the arguments worth recording.
#[derive(Clone, Copy, Debug)]
pub struct TrackedOp {
    pub name: &'static str,
    pub args: &'static [(&'static str, Extractor)],
}

/// Writer side of the activity log.
#[derive(Debug)]
pub struct ActivityLog {
    path: Option<PathBuf>,
    file: Option<File>,
    closed: bool,
}

impl ActivityLog {
    /// Opens `path` for appending and writes the start record.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut log = Self {
            file: open_append(&path),
            path: Some(path),
            closed: false,
        };
        let mut start = Map::new();
        start.insert("is_start".into(), Value::Bool(true));
        log.append(start);
        log
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            file: None,
            closed: true,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some() && !self.closed
    }

    /// Records one operation. Arguments the operation does not track are
    /// dropped.
    pub fn track(&mut self, op: &TrackedOp, args: &[(&str, Value)]) {
        if !self.is_enabled() {
            return;
        }
        let mut record = Map::new();
        record.insert("fn".into(), Value::from(op.name));
        for (name, extractor) in op.args {
            if let Some((_, value)) = args.iter().find(|(arg, _)| arg == name) {
                record.insert(name.to_string(), extractor.apply(value));
            }
        }
        self.append(record);
    }

    /// Writes the end record. Later calls do nothing.
    pub fn close(&mut self) {
        if !self.is_enabled() {
            return;
        }
        let mut end = Map::new();
        end.insert("is_end".into(), Value::Bool(true));
        self.append(end);
        self.closed = true;
        self.file = None;
    }

    fn append(&mut self, mut record: Map<String, Value>) {
        let Some(path) = &self.path else { return };
        let now = Utc::now();
        record.insert("time".into(), Value::from(unix_seconds(&now)));
        record.insert(
            "human_time".into(),
            Value::from(now.format(HUMAN_TIME_FORMAT).to_string()),
        );

        if self.file.is_none() {
            self.file = open_append(path);
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let mut line = Value::Object(record).to_string();
        line.push('\n');
        if let Err(err) = file.write_all(line.as_bytes()) {
            tracing::warn!(path = %path.display(), error = %err, "failed to append activity record");
            self.file = None;
        }
    }
}

impl Drop for ActivityLog {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            tracing::warn!(path = %parent.display(), error = %err, "failed to create activity log directory");
            return None;
        }
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to open activity log");
            None
        }
    }
}

fn unix_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64 / 1_000_000.0
}
