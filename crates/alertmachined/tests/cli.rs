//! Command-line regression tests.
//!
//! Runs the built binary against config files in a temp directory.

use std::path::Path;
use std::process::{Command, Output};

fn alertmachined(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_alertmachined"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

fn write_config(dir: &Path, content: &str) -> String {
    let path = dir.join("alertmachine.toml");
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[test]
fn sample_config_passes_check_config() {
    let sample = alertmachined(&["sample-config"]);
    assert!(sample.status.success());
    let text = String::from_utf8(sample.stdout).unwrap();
    assert!(text.contains("[[watch]]"));

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), &text);
    let check = alertmachined(&["check-config", "--config", &path]);
    assert!(check.status.success(), "{}", String::from_utf8_lossy(&check.stderr));

    let listing = String::from_utf8(check.stdout).unwrap();
    assert!(listing.contains("1 watch(es)"));
    assert!(listing.contains("nginx on web1, web2"));
    assert!(listing.contains("ps aux | grep 'nginx: master' | grep -v grep"));
}

#[test]
fn check_config_prints_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[[watch]]
name = "sshd"
hosts = ["bastion"]
port = 22
"#,
    );

    let out = alertmachined(&["check-config", "--config", &path, "--json"]);
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.trim_start().starts_with('['));
    assert!(text.contains(r#""name": "sshd""#));
    assert!(text.contains(r#""port": 22"#));
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[[watch]]
name = "empty"
hosts = ["web1"]
"#,
    );

    let out = alertmachined(&["check-config", "--config", &path]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("must set at least one of port, pid_file, grep"), "{stderr}");
}

#[test]
fn missing_config_fails() {
    let out = alertmachined(&["check-config", "--config", "/nonexistent/alertmachine.toml"]);
    assert!(!out.status.success());
}
