use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "passport-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_scenarios_writes_output() {
    let exe = env!("CARGO_BIN_EXE_passport-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-scenarios", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available scenarios"));
    assert!(content.contains("ritual-reset"));
}

#[test]
fn cli_runs_all_scenarios_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_passport-tester");
    let output_path = temp_path("all");
    let output = Command::new(exe)
        .args([
            "--scenarios",
            "all",
            "--iterations",
            "1",
            "--seeds",
            "1,0x2a",
            "--casts",
            "2000",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Passport Tester"));
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("\"scenarios\""));
    assert!(content.contains("Remote Overlay Merge"));
    assert!(content.contains("\"ritual\""));
}

#[test]
fn cli_serves_remote_rows_from_file() {
    let exe = env!("CARGO_BIN_EXE_passport-tester");
    let rows = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/remote_rows.json");
    let output_path = temp_path("remote");
    let status = Command::new(exe)
        .args([
            "--scenarios",
            "remote",
            "--iterations",
            "2",
            "--casts",
            "0",
            "--remote-records",
            rows,
            "--report",
            "markdown",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("✅ Remote Overlay Merge"));
}

#[test]
fn cli_rejects_bad_seed() {
    let exe = env!("CARGO_BIN_EXE_passport-tester");
    let output = Command::new(exe)
        .args(["--seeds", "not-a-seed", "--casts", "0"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not-a-seed"));
}
