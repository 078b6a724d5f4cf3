//! Reading activity logs back and summarizing them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use super::report::LogReport;
use crate::error::ScoremarkError;

/// Directory name under which annotation packages keep their logs.
pub const LOG_DIR_NAME: &str = "annotation_logs";

/// One record of an activity log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEvent {
    /// UNIX seconds.
    pub time: f64,
    pub kind: LogEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventKind {
    Start,
    End,
    Op {
        name: String,
        args: Map<String, Value>,
    },
}

/// Reads a newline-delimited log, or the legacy form holding one JSON
/// array.
///
/// A damaged final NDJSON line is dropped with a warning. A legacy array
/// cut off mid-write is repaired once by closing it after the last
/// complete element.
pub fn read_activity_log(path: &Path) -> Result<Vec<LogEvent>, ScoremarkError> {
    let content = fs::read_to_string(path).map_err(ScoremarkError::Io)?;
    parse_activity_log(&content, path)
}

/// Fuzz-only entrypoint for activity log parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_activity_log(input: &str) -> Result<Vec<LogEvent>, ScoremarkError> {
    parse_activity_log(input, Path::new("<fuzz>"))
}

fn parse_activity_log(content: &str, path: &Path) -> Result<Vec<LogEvent>, ScoremarkError> {
    let truncated = |message: String| ScoremarkError::TruncatedLog {
        path: path.to_path_buf(),
        message,
    };

    let records: Vec<Value> = if content.trim_start().starts_with('[') {
        match serde_json::from_str(content) {
            Ok(records) => records,
            Err(first_err) => {
                let repaired = repair_legacy_list(content);
                serde_json::from_str(&repaired).map_err(|_| truncated(first_err.to_string()))?
            }
        }
    } else {
        let lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();
        let mut records = Vec::with_capacity(lines.len());
        for (pos, (idx, line)) in lines.iter().enumerate() {
            match serde_json::from_str::<Value>(line) {
                Ok(record) => records.push(record),
                Err(err) if pos + 1 == lines.len() => {
                    tracing::warn!(
                        path = %path.display(),
                        line = idx + 1,
                        error = %err,
                        "dropping truncated final log record"
                    );
                }
                Err(err) => return Err(truncated(format!("line {}: {err}", idx + 1))),
            }
        }
        records
    };

    let mut events = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        match to_event(record) {
            Some(event) => events.push(event),
            None => tracing::warn!(path = %path.display(), record = idx, "skipping unrecognized log record"),
        }
    }
    tracing::debug!(path = %path.display(), events = events.len(), "read activity log");
    Ok(events)
}

fn repair_legacy_list(content: &str) -> String {
    let trimmed = content.trim_end();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed).trim_end();
    format!("{trimmed}]")
}

fn to_event(record: Value) -> Option<LogEvent> {
    let Value::Object(mut map) = record else {
        return None;
    };
    let time = map.get("time")?.as_f64()?;
    let flag = |map: &Map<String, Value>, key: &str| map.get(key).and_then(Value::as_bool) == Some(true);

    let kind = if flag(&map, "is_start") {
        LogEventKind::Start
    } else if flag(&map, "is_end") {
        LogEventKind::End
    } else {
        let name = map.remove("fn")?.as_str()?.to_string();
        map.remove("time");
        map.remove("human_time");
        LogEventKind::Op { name, args: map }
    };
    Some(LogEvent { time, kind })
}

/// Log files under any `annotation_logs` directory of a package, sorted.
pub fn find_package_logs(package: &Path) -> Result<Vec<PathBuf>, ScoremarkError> {
    if !package.is_dir() {
        return Err(ScoremarkError::PackageLayout {
            path: package.to_path_buf(),
            message: "package must be a directory".to_string(),
        });
    }

    let mut logs = Vec::new();
    for entry in WalkDir::new(package).follow_links(true) {
        let entry = entry.map_err(|source| ScoremarkError::PackageLayout {
            path: package.to_path_buf(),
            message: format!("failed while traversing directory: {source}"),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let in_log_dir = entry
            .path()
            .strip_prefix(package)
            .ok()
            .and_then(Path::parent)
            .is_some_and(|dir| dir.components().any(|c| c.as_os_str() == LOG_DIR_NAME));
        if in_log_dir {
            logs.push(entry.path().to_path_buf());
        }
    }
    logs.sort();
    Ok(logs)
}

/// Summarizes events from one or more logs.
pub fn analyze_logs(events: &[LogEvent]) -> LogReport {
    let mut sorted: Vec<&LogEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut report = LogReport::default();
    let mut open_session: Option<f64> = None;
    let mut last_time: Option<f64> = None;
    let mut per_minute: BTreeMap<i64, usize> = BTreeMap::new();

    for event in sorted {
        match &event.kind {
            LogEventKind::Start => {
                if let (Some(start), Some(last)) = (open_session, last_time) {
                    report.session_seconds += last - start;
                }
                report.sessions += 1;
                open_session = Some(event.time);
            }
            LogEventKind::End => {
                if let Some(start) = open_session.take() {
                    report.session_seconds += event.time - start;
                }
            }
            LogEventKind::Op { name, .. } => {
                report.events += 1;
                *report.by_operation.entry(name.clone()).or_default() += 1;
                *per_minute
                    .entry((event.time / 60.0).floor() as i64)
                    .or_default() += 1;
                report.first_event = report.first_event.or(Some(event.time));
                report.last_event = Some(event.time);
            }
        }
        last_time = Some(event.time);
    }
    if let (Some(start), Some(last)) = (open_session, last_time) {
        report.session_seconds += last - start;
    }

    report.active_minutes = per_minute.len();
    report.events_per_minute = if report.active_minutes == 0 {
        0.0
    } else {
        report.events as f64 / report.active_minutes as f64
    };
    report.per_minute = per_minute;
    report
}
