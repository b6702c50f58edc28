use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::tempdir;

fn sample(name: &str) -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let mut path = PathBuf::from(manifest_dir);
    path.push("samples");
    path.push(name);
    path
}

fn resumable() -> Command {
    Command::cargo_bin("resumable").expect("resumable binary not built")
}

#[test]
fn run_sum_loop_prints_result_and_callbacks() {
    let output = resumable().arg("run").arg(sample("sum_loop.json")).output().expect("failed to spawn");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "run failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("result: 45"), "unexpected output: {}", stdout);
    assert!(stdout.contains("callbacks: 10"), "unexpected output: {}", stdout);
}

#[test]
fn run_prints_trace_in_order() {
    let output = resumable().arg("run").arg(sample("finally_await.json")).output().expect("failed to spawn");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let traced: Vec<&str> = stdout
        .lines()
        .filter_map(|l| l.trim().strip_prefix("trace "))
        .collect();
    assert_eq!(traced, vec!["T", "FB", "FE", "C"]);
}

#[test]
fn lower_rejects_await_in_filter() {
    let output = resumable().arg("lower").arg(sample("await_in_filter.json")).output().expect("failed to spawn");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exception filter"), "unexpected error: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn lower_table_lists_resume_cases() {
    let output = resumable()
        .args(["lower", "--table"])
        .arg(sample("sum_loop.json"))
        .output()
        .expect("failed to spawn");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("__state0"), "missing resume label: {}", stdout);
    assert!(stdout.contains("hoisted"), "missing storage table: {}", stdout);
}

#[test]
fn lower_json_output_can_be_reloaded() {
    let td = tempdir().expect("tempdir");
    let lowered = td.path().join("lowered.json");
    resumable()
        .args(["lower", "--format", "json", "-o"])
        .arg(&lowered)
        .arg(sample("finally_await.json"))
        .assert()
        .success();

    let text = fs::read_to_string(&lowered).expect("lowered file missing");
    let body = resumable_core::ast::from_json(&text).expect("lowered json does not parse");
    assert!(resumable_core::ast::query::count_nodes(&body, &|k| matches!(k, resumable_core::NodeKind::Await { .. })) == 0);
}

#[test]
fn missing_file_fails_cleanly() {
    let td = tempdir().expect("tempdir");
    resumable()
        .arg("run")
        .arg(td.path().join("absent.json"))
        .assert()
        .code(1);
}

#[test]
fn run_json_report_carries_trace_and_counts() {
    let output = resumable()
        .args(["run", "--format", "json"])
        .arg(sample("finally_await.json"))
        .output()
        .expect("failed to spawn");
    assert!(output.status.success(), "run failed: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is not json");
    let trace: Vec<&str> = report["trace"]
        .as_array()
        .expect("trace array")
        .iter()
        .filter_map(|t| t.as_str())
        .collect();
    assert_eq!(trace, vec!["T", "FB", "FE", "C"]);
    assert!(report["callbacks"].as_u64().is_some());
}
