use assert_cmd::Command;
use predicates::prelude::*;

fn scoremark() -> Command {
    let mut cmd = Command::cargo_bin("scoremark").unwrap();
    cmd.env_remove("SCORES_ROOT")
        .env_remove("CLASSES_ROOT")
        .env_remove("SCOREMARK_LOG");
    cmd
}

fn write_png(path: &std::path::Path, height: u32, width: u32) {
    image::GrayImage::from_fn(width, height, |x, _| image::Luma([if x % 2 == 0 { 255 } else { 0 }]))
        .save(path)
        .expect("write png");
}

#[test]
fn runs() {
    scoremark()
        .assert()
        .success()
        .stdout(predicate::str::contains("scoremark"));
}

#[test]
fn outputs_tool_name() {
    scoremark()
        .arg("-V")
        .assert()
        .success()
        .stdout(format!("scoremark {}\n", env!("CARGO_PKG_VERSION")));
}

// Annotate subcommand tests

#[test]
fn annotate_loads_referenced_class_list() {
    scoremark()
        .args(["annotate", "--marks", "tests/fixtures/marks_a.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 marks, 0 edges, 4 classes"))
        .stdout(predicate::str::contains("Validation passed"));
}

#[test]
fn annotate_parse_adds_grammar_edges() {
    let output = scoremark()
        .args([
            "annotate",
            "--marks",
            "tests/fixtures/marks_a.xml",
            "--grammar",
            "tests/fixtures/grammar.txt",
            "--parse",
            "--output",
            "json",
        ])
        .output()
        .expect("run scoremark");
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json summary");
    assert_eq!(summary["marks"], 2);
    assert_eq!(summary["edges"], 1);
    assert_eq!(summary["edges_added"], 1);
    assert_eq!(summary["error_count"], 0);
}

#[test]
fn annotate_parse_requires_grammar() {
    scoremark()
        .args(["annotate", "--marks", "tests/fixtures/marks_a.xml", "--parse"])
        .assert()
        .code(2);
}

#[test]
fn annotate_rejects_unknown_output_format() {
    scoremark()
        .args(["annotate", "--output", "yaml"])
        .assert()
        .code(2);
}

#[test]
fn annotate_writes_parsed_mark_list() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("parsed.xml");
    let log = temp.path().join("annotation_logs").join("run.jsonl");

    scoremark()
        .args([
            "annotate",
            "--marks",
            "tests/fixtures/marks_a.xml",
            "--grammar",
            "tests/fixtures/grammar.txt",
            "--parse",
        ])
        .arg("--log")
        .arg(&log)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("edges added: 1"));

    let written = scoremark::io::read_mark_list(&out).expect("read written list");
    assert_eq!(written.marks.len(), 2);
    let head = &written.marks[0];
    assert_eq!(head.outlinks().iter().map(|id| id.as_u64()).collect::<Vec<_>>(), vec![1]);
    // The refs header is written only when both references are known.
    assert_eq!(written.refs, scoremark::io::Refs::default());

    let events = scoremark::activity::read_activity_log(&log).expect("read log");
    assert_eq!(events.len(), 3);
}

#[test]
fn annotate_reports_out_of_bounds_marks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let image = temp.path().join("score.png");
    write_png(&image, 8, 8);

    scoremark()
        .args(["annotate", "--marks", "tests/fixtures/marks_a.xml", "--image"])
        .arg(&image)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("OutOfBounds"))
        .stderr(predicate::str::contains("Validation failed"));
}

#[test]
fn annotate_grammar_without_class_list_fails() {
    scoremark()
        .args(["annotate", "--grammar", "tests/fixtures/grammar.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("class list"));
}

#[test]
fn annotate_missing_marks_file_fails() {
    scoremark()
        .args(["annotate", "--marks", "tests/fixtures/does_not_exist.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}

// Merge-marks subcommand tests

#[test]
fn merge_marks_concatenates_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("merged.xml");

    scoremark()
        .args([
            "merge-marks",
            "-i",
            "tests/fixtures/marks_a.xml",
            "tests/fixtures/marks_b.xml",
            "-o",
        ])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 4 marks from 2 files"));

    let merged = scoremark::io::read_mark_list(&out).expect("read merged");
    let ids: Vec<u64> = merged.marks.iter().map(|mark| mark.id.as_u64()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(merged.marks[2].class_name, "beam");
    assert!(merged.marks[2].mask().is_some());
}

#[test]
fn merge_marks_rejects_duplicate_ids() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("merged.xml");

    scoremark()
        .args([
            "merge-marks",
            "-i",
            "tests/fixtures/marks_a.xml",
            "tests/fixtures/marks_dup.xml",
            "-o",
        ])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate mark id 1"));
    assert!(!out.exists());
}

// Analyze-log subcommand tests

#[test]
fn analyze_log_reads_a_package() {
    scoremark()
        .args(["analyze-log", "-p", "tests/fixtures/package"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sessions:"))
        .stdout(predicate::str::contains("add_mark"))
        .stdout(predicate::str::contains("merge_selected"));
}

#[test]
fn analyze_log_json_output() {
    let output = scoremark()
        .args([
            "analyze-log",
            "-i",
            "tests/fixtures/package/annotator_a/annotation_logs/session_1.jsonl",
            "--output",
            "json",
        ])
        .output()
        .expect("run scoremark");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["sessions"], 1);
    assert_eq!(report["events"], 3);
    assert_eq!(report["active_minutes"], 2);
    assert_eq!(report["by_operation"]["add_mark"], 2);
    assert_eq!(report["session_seconds"], 100.0);
}

#[test]
fn analyze_log_repairs_truncated_legacy_list() {
    scoremark()
        .args([
            "analyze-log",
            "-i",
            "tests/fixtures/package/annotator_b/annotation_logs/session_2.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("merge_selected"));
}

#[test]
fn analyze_log_requires_a_source() {
    scoremark().arg("analyze-log").assert().code(2);
}

#[test]
fn analyze_log_rejects_missing_package() {
    scoremark()
        .args(["analyze-log", "-p", "tests/fixtures/no_such_package"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("annotation package"));
}
