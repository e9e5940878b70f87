use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "tidecast-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_tidecast-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("deterministic-replay"));
}

#[test]
fn cli_smoke_run_writes_json_report() {
    let exe = env!("CARGO_BIN_EXE_tidecast-tester");
    let output_path = temp_path("smoke");
    let output = Command::new(exe)
        .args([
            "--report",
            "json",
            "--scenarios",
            "smoke",
            "--iterations",
            "1",
            "--casts",
            "6",
            "--seeds",
            "1,0x2A",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let runs = report.as_array().expect("array");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1]["seed"], 42);
    assert!(runs.iter().all(|run| run["passed"] == true));
}

#[test]
fn cli_rejects_bad_seed() {
    let exe = env!("CARGO_BIN_EXE_tidecast-tester");
    let output = Command::new(exe)
        .args(["--seeds", "salmon", "--report", "json"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("salmon"));
}

#[test]
fn cli_unknown_scenario_warns_and_reports_nothing() {
    let exe = env!("CARGO_BIN_EXE_tidecast-tester");
    let output = Command::new(exe)
        .args(["--scenarios", "river-crossing", "--report", "markdown"])
        .output()
        .expect("run cli");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown scenario"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("_No scenarios executed._"));
}
