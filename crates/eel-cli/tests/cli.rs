//! CLI command integration tests.
//! Config-dependent tests point EEL_CONFIG at a file in a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn eel_cmd() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("eel").unwrap();
    cmd.env_remove("EEL_CONFIG");
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("eel.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn format_numbers_and_strings() {
    eel_cmd()
        .args(["format", "%s has %d items (%.1f%%)", "cart", "3", "42.26"])
        .assert()
        .success()
        .stdout("cart has 3 items (42.3%)\n");
}

#[test]
fn format_char_constants() {
    eel_cmd()
        .args(["format", "%c%c %d", "'h'", "'i'", "'ab'"])
        .assert()
        .success()
        .stdout("hi 24930\n");
}

#[test]
fn format_json_escapes_output() {
    eel_cmd()
        .args(["--json", "format", r"tab\there"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""output": "tab\\there""#))
        .stdout(predicate::str::contains(r#""length": 8.0"#));
}

#[test]
fn format_malformed_fails() {
    eel_cmd()
        .args(["format", "%q", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed format string"));
}

#[test]
fn match_reports_captures() {
    eel_cmd()
        .args(["match", "%s=%d", "answer=42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("match"))
        .stdout(predicate::str::contains("0 (%s) = \"answer\""))
        .stdout(predicate::str::contains("1 (%d) = \"42\" -> 42"));
}

#[test]
fn match_ignore_case_flag() {
    eel_cmd()
        .args(["match", "HELLO*", "hello world"])
        .assert()
        .success()
        .stdout("no match\n");
    eel_cmd()
        .args(["match", "-i", "HELLO*", "hello world"])
        .assert()
        .success()
        .stdout("match\n");
}

#[test]
fn match_malformed_pattern_fails() {
    eel_cmd()
        .args(["match", "%{name", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed pattern"));
}

#[test]
fn mdct_round_trip_is_accurate() {
    let output = eel_cmd()
        .args(["--json", "mdct", "--len", "256", "--blocks", "4"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["len"], 256);
    assert_eq!(report["scale"], 64.0);
    assert_eq!(report["plans_built"], 1);
    assert!(report["max_error"].as_f64().unwrap() < 1e-9);
}

#[test]
fn mdct_rejects_bad_length() {
    eel_cmd()
        .args(["mdct", "--len", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported block length"));
}

#[test]
fn mem_reports_pages() {
    eel_cmd()
        .args(["mem", "0", "70000", "1e12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pages:      2/512"))
        .stdout(predicate::str::contains("memtop:     131072"))
        .stdout(predicate::str::contains("failed:     1"));
}

#[test]
fn mem_respects_config_and_free() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[ram]\npages = 4\npage_size = 4096\n");
    let output = eel_cmd()
        .env("EEL_CONFIG", &config)
        .args(["--json", "mem", "0", "5000", "9000", "20000", "--free", "4096"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["page_cap"], 4);
    assert_eq!(report["pages_allocated"], 1);
    assert_eq!(report["failed_writes"], 1);
    assert_eq!(report["memtop"], 4096.0);
}

#[test]
fn config_flag_overrides_env() {
    let dir = TempDir::new().unwrap();
    let env_config = write_config(&dir, "[matcher]\nmax_steps = 7\n");
    let flag_config = dir.path().join("flag.toml");
    std::fs::write(&flag_config, "[matcher]\nmax_steps = 9\n").unwrap();

    eel_cmd()
        .env("EEL_CONFIG", &env_config)
        .arg("--config")
        .arg(&flag_config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""max_steps": 9"#));
}

#[test]
fn config_invalid_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[ram]\npage_size = 1000\n");
    eel_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}
