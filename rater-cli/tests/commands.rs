//! CLI Command Integration Tests
//!
//! Runs parsed commands against files in a temporary directory.

use std::path::Path;

use clap::Parser;
use rater_cli::{run, CliArgs};

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path.display().to_string()
}

fn rating_json(balance: u8) -> String {
    format!(
        r#"{{"score": 50, "metrics": [{{"section": "balance", "metrics": [
            {{"type": "balance_horizontal", "score": {balance}, "comment": ""}}]}}]}}"#
    )
}

fn run_args(args: &[&str]) -> anyhow::Result<String> {
    let parsed = CliArgs::try_parse_from(std::iter::once("rater").chain(args.iter().copied()))?;
    run(&parsed)
}

#[test]
fn test_consistency_of_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write(dir.path(), "a.json", &rating_json(80));
    let b = write(dir.path(), "b.json", &rating_json(90));
    let c = write(dir.path(), "c.json", &rating_json(70));

    let out = run_args(&["--json", "consistency", &a, &b, &c]).expect("run");
    let report: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(report["score"], 89);
    assert_eq!(report["spreads"][0]["metric_type"], "balance_horizontal");
}

#[test]
fn test_reconcile_detection_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = write(
        dir.path(),
        "detection.json",
        r#"{"boxes": [{"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.1},
                      {"x": 0.1, "y": 0.2, "width": 0.005, "height": 0.1}],
            "transform_height": 1.0}"#,
    );
    let out = run_args(&["--json", "reconcile", &file]).expect("run");
    let value: serde_json::Value = serde_json::from_str(&out).expect("json");
    assert_eq!(value["elements"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["discarded"], 1);
}

#[test]
fn test_request_refuses_single_element() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = write(
        dir.path(),
        "session.json",
        r#"{"canvas": {"width": 390.0, "height": 844.0},
            "batches": [{"origin": "manual",
                         "elements": [{"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}]}]}"#,
    );
    let err = run_args(&["--min-elements", "2", "request", &file]).expect_err("too few");
    assert!(err.to_string().contains("Insufficient input"));
}

#[test]
fn test_ratings_add_list_consistency_remove() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("ratings");
    let data_dir = data.display().to_string();
    let a = write(dir.path(), "a.json", &rating_json(60));
    let b = write(dir.path(), "b.json", &rating_json(80));

    let id_a = run_args(&["--data-dir", &data_dir, "ratings", "add", &a, "--name", "First"])
        .expect("add a");
    let id_b = run_args(&[
        "--data-dir",
        &data_dir,
        "ratings",
        "add",
        &b,
        "--name",
        "Second",
        "--color",
        "#336699",
    ])
    .expect("add b");

    let listed = run_args(&["--data-dir", &data_dir, "ratings", "list"]).expect("list");
    assert!(listed.contains("First"));
    assert!(listed.contains("Second"));

    let out = run_args(&[
        "--data-dir",
        &data_dir,
        "ratings",
        "consistency",
        &id_a,
        &id_b,
    ])
    .expect("consistency");
    assert!(out.starts_with("Consistency: 82"));

    run_args(&["--data-dir", &data_dir, "ratings", "remove", &id_a]).expect("remove");
    let err = run_args(&["--data-dir", &data_dir, "ratings", "remove", &id_a]).expect_err("gone");
    assert!(err.to_string().contains("Rating not found"));
}
