//! End-to-end runs of the `winocr` binary against the stand-in interpreter.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn fake_interpreter() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../winocr-session/tests/fixtures/pwsh")
}

fn winocr(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_winocr"))
        .arg("--interpreter-path")
        .arg(fake_interpreter())
        .args(args)
        .env_remove("WINOCR_LANGUAGE")
        .env_remove("WINOCR_TIMEOUT_MS")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_recognize_prints_text() {
    let dir = TempDir::new().unwrap();
    let hello = dir.path().join("hello.txt");
    std::fs::write(&hello, "HELLO WORLD").unwrap();

    let output = winocr(&["recognize", hello.to_str().unwrap()]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "HELLO WORLD\n");
}

#[test]
fn test_empty_file_fails_with_input_status() {
    let dir = TempDir::new().unwrap();
    let empty = dir.path().join("empty.png");
    std::fs::write(&empty, b"").unwrap();

    let output = winocr(&["recognize", empty.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("decode_failed"));
}

#[test]
fn test_batch_continues_past_bad_images() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.txt");
    let missing = dir.path().join("b.png");
    let last = dir.path().join("c.txt");
    std::fs::write(&first, "FIRST").unwrap();
    std::fs::write(&last, "LAST").unwrap();

    let output = winocr(&[
        "recognize",
        "--json",
        first.to_str().unwrap(),
        missing.to_str().unwrap(),
        last.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));

    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["data"]["text"], "FIRST");
    assert_eq!(lines[1]["success"], false);
    assert_eq!(lines[1]["error"]["code"], "file_not_found");
    assert_eq!(lines[1]["error"]["category"], "input");
    assert_eq!(lines[2]["data"]["text"], "LAST");
}

#[test]
fn test_missing_language_is_environment_status() {
    let dir = TempDir::new().unwrap();
    let hello = dir.path().join("hello.txt");
    std::fs::write(&hello, "HELLO").unwrap();

    let output = winocr(&["recognize", "--language", "xx-XX", hello.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_crash_is_transport_status() {
    let dir = TempDir::new().unwrap();
    let crash = dir.path().join("crash.png");
    std::fs::write(&crash, b"boom").unwrap();

    let output = winocr(&["recognize", crash.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_languages_lists_installed() {
    let output = winocr(&["languages", "--language", "xx-XX"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "en-US\nde-DE\n");
}

#[test]
fn test_info_json() {
    let output = winocr(&["info", "--json"]);

    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(info["success"], true);
    assert_eq!(info["data"]["type"], "info");
    assert_eq!(info["data"]["version"], "7.4.1");
    assert_eq!(info["data"]["max_image_dimension"], 10000);
}

#[test]
fn test_usage_error_exit_status() {
    let output = winocr(&["recognize"]);

    assert_eq!(output.status.code(), Some(2));
}
