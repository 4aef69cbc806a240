//! Binary-level CLI tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SPEC: &str = r#"
name: phony
version: "1.0.0"
revision: "1"
description: A phony package
sources:
  src:
    inline:
      dir:
        files:
          phony.sh:
            contents: "#!/bin/sh\necho 'phony'\n"
            permissions: 0o755
artifacts:
  binaries:
    src/phony.sh: {}
"#;

fn write_spec(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("spec.yml");
    std::fs::write(&path, SPEC).unwrap();
    path
}

#[test]
fn targets_lists_debug_resolve() {
    let dir = TempDir::new().unwrap();
    let spec = write_spec(&dir);

    Command::cargo_bin("packsmith")
        .unwrap()
        .args(["targets", "--spec"])
        .arg(&spec)
        .assert()
        .success()
        .stdout(predicate::str::contains("debug/resolve"))
        .stdout(predicate::str::contains("bin/zip"));
}

#[test]
fn build_zip_writes_archive() {
    let dir = TempDir::new().unwrap();
    let spec = write_spec(&dir);
    let out = dir.path().join("out");

    Command::cargo_bin("packsmith")
        .unwrap()
        .args(["build", "--quiet", "--target", "bin/zip", "--spec"])
        .arg(&spec)
        .arg("--output")
        .arg(&out)
        .current_dir(dir.path())
        .assert()
        .success();

    assert!(out.join("binaries.zip").is_file());
}

#[test]
fn build_unknown_target_fails_with_routing_error() {
    let dir = TempDir::new().unwrap();
    let spec = write_spec(&dir);

    Command::cargo_bin("packsmith")
        .unwrap()
        .args(["build", "--quiet", "--target", "windows/zip", "--spec"])
        .arg(&spec)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such handler for target"));
}

#[test]
fn build_rejects_malformed_build_arg() {
    let dir = TempDir::new().unwrap();
    let spec = write_spec(&dir);

    Command::cargo_bin("packsmith")
        .unwrap()
        .args([
            "build",
            "--quiet",
            "--target",
            "bin/zip",
            "--build-arg",
            "NOEQUALS",
            "--spec",
        ])
        .arg(&spec)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn build_resolve_emits_spec_document() {
    let dir = TempDir::new().unwrap();
    let spec = write_spec(&dir);
    let out = dir.path().join("resolved");

    Command::cargo_bin("packsmith")
        .unwrap()
        .args(["build", "--quiet", "--target", "debug/resolve", "--spec"])
        .arg(&spec)
        .arg("--output")
        .arg(&out)
        .current_dir(dir.path())
        .assert()
        .success();

    let doc = std::fs::read_to_string(out.join("spec.yml")).unwrap();
    assert!(doc.contains("name: phony"));
}

#[test]
fn version_prints_package_version() {
    Command::cargo_bin("packsmith")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("packsmith"));
}
