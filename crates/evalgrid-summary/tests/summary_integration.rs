//! Integration tests for results-tree summarization.

use evalgrid_summary::{
    summarize_results, FileOutcome, ModelSummaryOutcome, CSV_HEADER, NOT_AVAILABLE,
};
use std::path::Path;
use tempfile::tempdir;

fn write_result(root: &Path, model: &str, task: &str, content: &str) {
    let dir = root.join(model);
    std::fs::create_dir_all(&dir).expect("model dir");
    std::fs::write(dir.join(format!("results_{task}.json")), content).expect("write result");
}

fn summary_lines(root: &Path, model: &str) -> Vec<String> {
    let path = root.join(model).join(format!("{model}_summary.csv"));
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
        .lines()
        .map(str::to_string)
        .collect()
}

/// Test: the documented single-record example
#[test]
fn test_demo_document_produces_single_row() {
    let root = tempdir().unwrap();
    write_result(
        root.path(),
        "m",
        "demo",
        r#"{"results": {"t1": {"acc": 0.5, "acc_stderr": 0.02, "note": "n/a"}}}"#,
    );

    let report = summarize_results(root.path()).expect("summarize");
    assert_eq!(report.written_count(), 1);

    let lines = summary_lines(root.path(), "m");
    assert_eq!(lines, vec![CSV_HEADER.to_string(), "demo,t1,acc,0.5,0.02".to_string()]);
}

/// Test: rows are ordered by task, then sub_task, then metric
#[test]
fn test_rows_sorted_across_task_files() {
    let root = tempdir().unwrap();
    write_result(
        root.path(),
        "m",
        "b",
        r#"{"results": {"s2": {"acc": 0.1}, "s1": {"f1": 0.2, "acc": 0.3}}}"#,
    );
    write_result(
        root.path(),
        "m",
        "a",
        r#"{"results": {"s1": {"acc": 0.4}}}"#,
    );

    summarize_results(root.path()).expect("summarize");

    let lines = summary_lines(root.path(), "m");
    assert_eq!(
        lines[1..],
        [
            format!("a,s1,acc,0.4,{NOT_AVAILABLE}"),
            format!("b,s1,acc,0.3,{NOT_AVAILABLE}"),
            format!("b,s1,f1,0.2,{NOT_AVAILABLE}"),
            format!("b,s2,acc,0.1,{NOT_AVAILABLE}"),
        ]
    );
}

/// Test: a malformed file is skipped and the rest still summarize
#[test]
fn test_malformed_file_skipped() {
    let root = tempdir().unwrap();
    write_result(
        root.path(),
        "m",
        "good",
        r#"{"results": {"g": {"acc": 0.9, "acc_stderr": 0.01}, "h": {"acc": 0.8}}}"#,
    );
    write_result(root.path(), "m", "truncated", r#"{"results": {"t": {"acc": 0."#);

    let report = summarize_results(root.path()).expect("summarize");
    let model = report.model("m").expect("model report");

    assert_eq!(
        model.outcome,
        ModelSummaryOutcome::Written {
            path: root.path().join("m").join("m_summary.csv"),
            records: 2,
        }
    );
    let outcomes: Vec<(&str, &FileOutcome)> = model
        .files
        .iter()
        .map(|f| (f.task.as_str(), &f.outcome))
        .collect();
    assert_eq!(outcomes[0], ("good", &FileOutcome::Parsed { records: 2 }));
    assert_eq!(outcomes[1].0, "truncated");
    assert!(matches!(outcomes[1].1, FileOutcome::Malformed { .. }));

    assert_eq!(summary_lines(root.path(), "m").len(), 3);
}

/// Test: a model with nothing usable gets no summary, others are unaffected
#[test]
fn test_empty_aggregate_writes_nothing() {
    let root = tempdir().unwrap();
    write_result(root.path(), "bad", "x", "garbage");
    write_result(root.path(), "bad", "y", r#"{"results": {}}"#);
    write_result(root.path(), "bad", "z", r#"{"configs": {}}"#);
    write_result(
        root.path(),
        "good",
        "x",
        r#"{"results": {"x": {"acc": 1.0}}}"#,
    );

    let report = summarize_results(root.path()).expect("summarize");

    let bad = report.model("bad").expect("bad model");
    assert_eq!(bad.outcome, ModelSummaryOutcome::Empty);
    assert_eq!(bad.files[1].outcome, FileOutcome::NoResults);
    assert_eq!(bad.files[2].outcome, FileOutcome::NoResults);
    assert!(!root.path().join("bad").join("bad_summary.csv").exists());

    let good = report.model("good").expect("good model");
    assert!(matches!(good.outcome, ModelSummaryOutcome::Written { records: 1, .. }));
    assert_eq!(report.written_count(), 1);
}

/// Test: a model whose results all became unusable loses its old summary
#[test]
fn test_empty_pass_removes_previous_summary() {
    let root = tempdir().unwrap();
    write_result(root.path(), "m", "a", r#"{"results": {"s": {"acc": 0.9}}}"#);
    summarize_results(root.path()).expect("first pass");

    let summary = root.path().join("m").join("m_summary.csv");
    assert!(summary.exists());

    write_result(root.path(), "m", "a", r#"{"results": {"s": {"acc": 0."#);
    let report = summarize_results(root.path()).expect("second pass");

    assert_eq!(
        report.model("m").expect("model").outcome,
        ModelSummaryOutcome::Empty
    );
    assert!(!summary.exists());
}

/// Test: summaries are regenerated in full, not merged
#[test]
fn test_summary_regenerated_on_each_pass() {
    let root = tempdir().unwrap();
    write_result(
        root.path(),
        "m",
        "a",
        r#"{"results": {"s": {"acc": 0.1, "f1": 0.2}}}"#,
    );
    summarize_results(root.path()).expect("first pass");
    assert_eq!(summary_lines(root.path(), "m").len(), 3);

    write_result(root.path(), "m", "a", r#"{"results": {"s": {"acc": 0.7}}}"#);
    summarize_results(root.path()).expect("second pass");

    let lines = summary_lines(root.path(), "m");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], format!("a,s,acc,0.7,{NOT_AVAILABLE}"));
}

/// Test: the previous summary file is never mistaken for a result file
#[test]
fn test_summary_file_not_reread() {
    let root = tempdir().unwrap();
    write_result(root.path(), "m", "a", r#"{"results": {"s": {"acc": 0.5}}}"#);

    summarize_results(root.path()).expect("first pass");
    let report = summarize_results(root.path()).expect("second pass");

    assert_eq!(report.model("m").expect("model").files.len(), 1);
}
