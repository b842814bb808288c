//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

const PROJECT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<msi version="2.0">
  <table name="ISPathVariable">
    <col key="yes" def="s72">ISPathVariable</col>
    <col def="S255">Value</col>
    <col def="S255">TestValue</col>
    <col def="i4">Type</col>
    <row><td>ISProjectFolder</td><td/><td/><td>1</td></row>
  </table>
  <table name="File">
    <col key="yes" def="s72">File</col>
    <col def="S255">ISBuildSourcePath</col>
    <row><td>b</td><td>&lt;ISProjectFolder&gt;\b.txt</td></row>
    <row><td>a</td><td>&lt;ISProjectFolder&gt;\a.txt</td></row>
    <row><td>z</td><td>&lt;ISProjectFolder&gt;\missing.txt</td></row>
  </table>
</msi>
"#;

fn setup() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let proj = dir.path().join("proj");
    write(&proj.join("a.txt"), "a");
    write(&proj.join("b.txt"), "b");
    let ism = proj.join("Setup.ism");
    write(&ism, PROJECT);
    (dir, ism)
}

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ism-collect").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_cli_requires_files() {
    let dir = tempdir().unwrap();
    cmd(dir.path()).assert().failure();
}

#[test]
fn test_cli_list_mode() {
    let (dir, ism) = setup();
    let proj = ism.parent().unwrap();

    let output = cmd(dir.path()).arg(&ism).assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();

    let a = proj.join("a.txt").display().to_string();
    let b = proj.join("b.txt").display().to_string();
    let a_pos = stdout.find(&a).unwrap();
    let b_pos = stdout.find(&b).unwrap();
    assert!(a_pos < b_pos);

    assert!(stdout.contains("Missing files or folders (1)"));
    assert!(stdout.contains("missing.txt"));
    assert!(stdout.contains("ISProductFolder="));
}

#[test]
fn test_cli_copy_mode() {
    let (dir, ism) = setup();
    let out = dir.path().join("out");
    write(&out.join("stale.txt"), "stale");

    cmd(dir.path())
        .arg(&ism)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied: 2"));

    assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "a");
    assert_eq!(fs::read_to_string(out.join("b.txt")).unwrap(), "b");
    assert!(!out.join("stale.txt").exists());
}

#[test]
fn test_cli_copy_separate() {
    let (dir, ism) = setup();
    let out = dir.path().join("out");

    cmd(dir.path())
        .arg(&ism)
        .args(["--output", out.to_str().unwrap(), "--separate"])
        .assert()
        .success();

    assert!(out.join("Setup").join("a.txt").is_file());
}

#[test]
fn test_cli_json_report() {
    let (dir, ism) = setup();

    cmd(dir.path())
        .arg(&ism)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"existing\""))
        .stdout(predicate::str::contains("\"missing\""));
}

#[test]
fn test_cli_malformed_project() {
    let dir = tempdir().unwrap();
    let ism = dir.path().join("Broken.ism");
    write(&ism, "<msi><table name=\"File\"><row></table></msi>");

    cmd(dir.path())
        .arg(&ism)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to process"));
}

#[test]
fn test_cli_config_file() {
    let (dir, ism) = setup();
    write(
        &dir.path().join("ism-collect.yaml"),
        "product_folder: '/opt/installshield'\n",
    );

    cmd(dir.path())
        .arg(&ism)
        .assert()
        .success()
        .stdout(predicate::str::contains("ISProductFolder=/opt/installshield"));
}

#[test]
fn test_cli_bad_config() {
    let (dir, ism) = setup();
    let config = dir.path().join("settings.toml");
    write(&config, "x = 1");

    cmd(dir.path())
        .arg(&ism)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
