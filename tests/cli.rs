use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// `a.bin` has a zeroed tail, `b.bin` does not, `c.bin` is empty.
fn create_scenario_fixture() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().expect("Failed to create temp dir");
    let mut a = vec![0x11u8; 10_000];
    a[10_000 - 8192..].fill(0);
    temp.child("a.bin")
        .write_binary(&a)
        .expect("Failed to write a.bin");
    temp.child("b.bin")
        .write_binary(&[b'b'; 100])
        .expect("Failed to write b.bin");
    temp.child("c.bin")
        .touch()
        .expect("Failed to write c.bin");
    temp
}

#[test]
fn cli_reports_zero_tail_and_summary() {
    let temp = create_scenario_fixture();
    let dir = temp.path();

    cargo_bin_cmd!("tailzero")
        .arg(dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("looking at 3 files in folder"))
        .stdout(predicate::str::contains("the last 8192 bytes are zero: "))
        .stdout(predicate::str::contains("a.bin"))
        .stdout(predicate::str::contains("b.bin").not())
        .stdout(predicate::str::contains(
            "found 1 files with a zero tail out of 3",
        ));
}

#[test]
fn cli_serial_mode_matches_parallel() {
    let temp = create_scenario_fixture();
    temp.child("nested/deeper/z.bin")
        .write_binary(&[0u8; 20])
        .expect("Failed to write nested file");
    let dir = temp.path();

    for extra in [&["-s"][..], &[][..], &["--threads", "2"][..]] {
        cargo_bin_cmd!("tailzero")
            .args(extra)
            .arg(dir)
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "found 2 files with a zero tail out of 4",
            ));
    }
}

#[test]
fn cli_empty_directory_prints_usage_and_fails() {
    let temp = assert_fs::TempDir::new().expect("Failed to create temp dir");
    temp.child("only_dirs/inner")
        .create_dir_all()
        .expect("Failed to create subdirectories");

    cargo_bin_cmd!("tailzero")
        .arg(temp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no files found"))
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn cli_missing_root_fails_before_scanning() {
    let temp = assert_fs::TempDir::new().expect("Failed to create temp dir");
    let missing = temp.path().join("not-there");

    cargo_bin_cmd!("tailzero")
        .arg(&missing)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("can't find path"))
        .stdout(predicate::str::contains("looking at").not())
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn cli_file_root_is_rejected() {
    let temp = create_scenario_fixture();

    cargo_bin_cmd!("tailzero")
        .arg(temp.child("b.bin").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("path isn't a directory"));
}

#[test]
fn cli_invalid_flag_prints_usage() {
    cargo_bin_cmd!("tailzero")
        .arg("-q")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--mute-errors"));
}

#[test]
fn cli_help_exits_successfully() {
    cargo_bin_cmd!("tailzero")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--serial"));
}

#[test]
fn cli_json_summary_outputs_valid_json() {
    let temp = create_scenario_fixture();
    let dir = temp.path();

    let assert = cargo_bin_cmd!("tailzero")
        .args(["--summary-format", "json"])
        .arg(dir)
        .assert()
        .success();

    let output = String::from_utf8(assert.get_output().stdout.clone())
        .expect("stdout should be valid UTF-8");
    let json_start = output
        .find('{')
        .expect("JSON output should contain an object");
    let summary: Value =
        serde_json::from_str(&output[json_start..]).expect("expected JSON summary output");
    assert_eq!(summary["zero_tail_files"].as_u64().unwrap(), 1);
    assert_eq!(summary["scanned_files"].as_u64().unwrap(), 3);
    assert_eq!(summary["failed_files"].as_u64().unwrap(), 0);
    assert_eq!(summary["tail_bytes"].as_u64().unwrap(), 8192);
}

#[test]
fn cli_tail_bytes_option_changes_window() {
    let temp = assert_fs::TempDir::new().expect("Failed to create temp dir");
    let mut data = vec![7u8; 4096];
    data[4000..].fill(0);
    temp.child("partial.bin")
        .write_binary(&data)
        .expect("Failed to write partial.bin");

    cargo_bin_cmd!("tailzero")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "found 0 files with a zero tail out of 1",
        ));

    cargo_bin_cmd!("tailzero")
        .args(["--tail-bytes", "96"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("the last   96 bytes are zero: "))
        .stdout(predicate::str::contains(
            "found 1 files with a zero tail out of 1",
        ));
}

#[cfg(unix)]
#[test]
fn cli_permission_denied_reported_unless_muted() {
    let temp = create_scenario_fixture();
    let locked = temp.child("locked.bin");
    locked
        .write_binary(&[0u8; 64])
        .expect("Failed to write locked.bin");
    fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o000))
        .expect("Failed to tighten permissions");

    // Privileged users bypass file modes; nothing to observe then.
    if fs::File::open(locked.path()).is_ok() {
        eprintln!("skipping permission check: file modes are not enforced for this user");
        fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o644))
            .expect("Failed to restore permissions");
        return;
    }

    let assert = cargo_bin_cmd!("tailzero").arg(temp.path()).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())
        .expect("stdout should be valid UTF-8");
    let error_lines: Vec<_> = stdout
        .lines()
        .filter(|line| line.starts_with("can't open file"))
        .collect();
    assert_eq!(error_lines.len(), 1, "stdout was: {}", stdout);
    assert!(error_lines[0].contains("locked.bin"));
    assert!(stdout.contains("found 1 files with a zero tail out of 4 (1 could not be checked)"));

    let assert = cargo_bin_cmd!("tailzero")
        .arg("-m")
        .arg(temp.path())
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())
        .expect("stdout should be valid UTF-8");
    assert!(!stdout.contains("can't open file"));
    assert!(stdout.contains("the last 8192 bytes are zero: "));
    assert!(stdout.contains("found 1 files with a zero tail out of 4"));

    fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o644))
        .expect("Failed to restore permissions");
}
