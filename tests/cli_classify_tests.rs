//! End-to-end tests for `buttonflow classify`, `buttonflow actions` and `buttonflow run`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Path to the buttonflow binary
fn buttonflow_bin() -> String {
    std::env::var("CARGO_BIN_EXE_buttonflow")
        .unwrap_or_else(|_| "target/release/buttonflow".to_string())
}

fn isolated_command(args: &[&str], config_dir: &Path) -> Command {
    let mut cmd = Command::new(buttonflow_bin());
    cmd.env("BUTTONFLOW_CONFIG_DIR", config_dir);
    cmd.env_remove("RUST_LOG");
    cmd.args(args);
    cmd
}

fn write_script(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("capture.txt");
    std::fs::write(&path, content).expect("Failed to write capture script");
    path
}

fn classify_json(args: &[&str], config_dir: &Path) -> serde_json::Value {
    let output = isolated_command(args, config_dir)
        .output()
        .expect("Failed to execute command");
    assert_eq!(
        output.status.code(),
        Some(0),
        "Classify should succeed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("Should parse JSON")
}

fn gestures(result: &serde_json::Value) -> Vec<(u64, String)> {
    result["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["at_ms"].as_u64().unwrap(),
                e["gesture"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

// ============================================================================
// Classify Command Tests
// ============================================================================

#[test]
fn test_classify_short_press() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let script = write_script(
        temp_dir.path(),
        "0 buttonState changed (0->1)\n300 buttonState changed (1->0)\n",
    );

    let result = classify_json(
        &["classify", script.to_str().unwrap(), "--json"],
        temp_dir.path(),
    );
    assert_eq!(
        gestures(&result),
        vec![(0, "press_start".to_string()), (300, "short_release".to_string())]
    );
    assert_eq!(result["events"][1]["held_ms"], 300);
}

#[test]
fn test_classify_long_press() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let script = write_script(
        temp_dir.path(),
        "0 hex:01 00 00 00 00 00 00 00\n1200 hex:00 00 00 00 00 00 00 00\n",
    );

    let result = classify_json(
        &["classify", script.to_str().unwrap(), "--json"],
        temp_dir.path(),
    );
    assert_eq!(
        gestures(&result),
        vec![
            (0, "press_start".to_string()),
            (800, "press_held".to_string()),
            (1200, "long_release".to_string())
        ]
    );
}

#[test]
fn test_classify_threshold_override() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let script = write_script(
        temp_dir.path(),
        "0 buttonState changed (0->1)\n300 buttonState changed (1->0)\n",
    );

    let result = classify_json(
        &["classify", script.to_str().unwrap(), "--threshold", "200", "--json"],
        temp_dir.path(),
    );
    let kinds: Vec<String> = gestures(&result).into_iter().map(|(_, g)| g).collect();
    assert_eq!(kinds, vec!["press_start", "press_held", "long_release"]);
}

#[test]
fn test_classify_two_channels_single_press() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let script = write_script(
        temp_dir.path(),
        "0 hex:01 00 00 00 00 00 00 00\n\
         2 buttonState changed (0->1)\n\
         250 hex:00 00 00 00 00 00 00 00\n\
         251 buttonState changed (1->0)\n",
    );

    let result = classify_json(
        &["classify", script.to_str().unwrap(), "--json"],
        temp_dir.path(),
    );
    let starts = gestures(&result)
        .iter()
        .filter(|(_, g)| g == "press_start")
        .count();
    assert_eq!(starts, 1);
    assert_eq!(result["edges"], 4);
    assert_eq!(result["anomalies"], 2);
}

#[test]
fn test_classify_resolve_with_app() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let script = write_script(
        temp_dir.path(),
        "0 KEY DOWN: 7\n100 KEY UP: 7\n200 hex:02 00 00 00 00 00 00 00\n300 hex:00 00 00 00 00 00 00 00\n",
    );

    let result = classify_json(
        &[
            "classify",
            script.to_str().unwrap(),
            "--resolve",
            "--app",
            "Termius",
            "--json",
        ],
        temp_dir.path(),
    );
    let events = result["events"].as_array().unwrap();
    let key_release = events
        .iter()
        .find(|e| e["button_id"] == "key-7" && e["gesture"] == "short_release")
        .expect("key-7 short release");
    assert_eq!(key_release["role"], "key-7");
    assert_eq!(key_release["binding"]["category"], "none");

    let secondary = events
        .iter()
        .find(|e| e["button_id"] == "secondary" && e["gesture"] == "short_release")
        .expect("secondary short release");
    assert_eq!(secondary["role"], "middle");
    assert_eq!(secondary["binding"]["action"], "Termius Next Tab");
}

#[test]
fn test_classify_human_output() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let script = write_script(
        temp_dir.path(),
        "0 buttonState changed (0->1)\n300 buttonState changed (1->0)\n",
    );

    let output = isolated_command(&["classify", script.to_str().unwrap(), "--resolve"], temp_dir.path())
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("short_release"), "stdout: {stdout}");
    assert!(stdout.contains("Start Recording"), "stdout: {stdout}");
}

#[test]
fn test_classify_from_stdin() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let mut child = isolated_command(&["classify", "-", "--json"], temp_dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"0 buttonState changed (0->1)\n50 buttonState changed (1->0)\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(0));

    let result: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert_eq!(result["events"].as_array().unwrap().len(), 2);
}

#[test]
fn test_classify_invalid_script() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let script = write_script(temp_dir.path(), "500 buttonState changed (0->1)\n100 x\n");

    let output = isolated_command(&["classify", script.to_str().unwrap()], temp_dir.path())
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Line 2"), "stderr: {stderr}");
}

#[test]
fn test_classify_missing_file() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let output = isolated_command(&["classify", "/nonexistent/capture.txt"], temp_dir.path())
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// Actions Command Tests
// ============================================================================

#[test]
fn test_actions_json_by_category() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let output = isolated_command(
        &["actions", "--category", "dictation_control", "--json"],
        temp_dir.path(),
    )
    .output()
    .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(0));

    let result: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    let actions = result.as_array().unwrap();
    assert!(actions.iter().all(|a| a["category"] == "dictation_control"));
    assert!(actions.iter().any(|a| a["id"] == "Start Recording"));
}

#[test]
fn test_actions_search_and_listing() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let output = isolated_command(&["actions", "--search", "termius"], temp_dir.path())
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Termius Next Tab"));
    assert!(!stdout.contains("Start Recording"));

    let output = isolated_command(&["actions"], temp_dir.path())
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Prefixes: shell:"), "Custom command prefixes listed");
}

#[test]
fn test_actions_unknown_category() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let output = isolated_command(&["actions", "--category", "telepathy"], temp_dir.path())
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(1));
}

// ============================================================================
// Run Command Tests
// ============================================================================

#[test]
fn test_run_requires_a_source() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let output = isolated_command(&["run", "--dry-run"], temp_dir.path())
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_run_missing_device() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let output = isolated_command(
        &["run", "--dry-run", "--hid", "/nonexistent/hidraw9"],
        temp_dir.path(),
    )
    .output()
    .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));
}

fn run_output(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

#[cfg(unix)]
#[test]
fn test_run_text_command_dry_run() {
    let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let command = "echo 'buttonState changed (0->1)'; sleep 0.1; \
                   echo 'buttonState changed (1->0)'; sleep 1";
    let output = isolated_command(
        &["run", "--dry-run", "--json", "--text-command", command],
        temp_dir.path(),
    )
    .output()
    .expect("Failed to execute command");
    assert_eq!(
        output.status.code(),
        Some(0),
        "Run should end cleanly when its source ends. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let results = run_output(&output);
    let executed = results
        .iter()
        .find(|r| r["gesture"] == "short_release")
        .expect("short release dispatched");
    assert_eq!(executed["status"], "executed");
    assert_eq!(executed["role"], "bottom");
    assert_eq!(executed["binding"]["action"], "Start Recording");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("source lost"), "stderr: {stderr}");
}
