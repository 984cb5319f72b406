//! The `cpkg` binary end to end.

use assert_cmd::Command;
use cpkg::config::CONFIG_ENV;
use cpkg::constants::{GRAPH_INFO_FILE, LOCKFILE_NAME};
use cpkg::lockfile::{GraphInfo, GraphLockFile};
use cpkg::test_utils::DirectoryFixture;
use predicates::prelude::*;

use super::common::write_app;

/// Fixture with `app -> liba -> zlib` and its config written to disk.
fn setup() -> (DirectoryFixture, std::path::PathBuf) {
    let fixture = DirectoryFixture::new().unwrap();
    fixture.add_recipe("cache", "liba/1.0", "[requirements]\nrequires = [\"zlib/[>=1.2 <2]\"]\n").unwrap();
    fixture.add_recipe("center", "zlib/1.2.11", "").unwrap();
    write_app(&fixture, &["liba/1.0"]);
    let config = fixture.write_config(&fixture.config(&["center"])).unwrap();
    (fixture, config)
}

fn cpkg(config: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("cpkg").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG").arg("--config").arg(config);
    cmd
}

#[test]
fn test_graph_prints_tree_and_advisories() {
    let (fixture, config) = setup();
    cpkg(&config)
        .arg("graph")
        .arg(fixture.path().join("app"))
        .args(["--build", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app/1.0"))
        .stdout(predicate::str::contains("└── liba/1.0 Build"))
        .stdout(predicate::str::contains("zlib/1.2.11 Build"))
        .stderr(predicate::str::contains("zlib/[>=1.2 <2] required by liba/1.0 resolved to zlib/1.2.11"));
}

#[test]
fn test_graph_json_output() {
    let (fixture, config) = setup();
    let output = cpkg(&config)
        .args(["graph", "liba/1.0", "--format", "json"])
        .current_dir(fixture.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["root_reference"], "liba/1.0");
    let nodes = json["nodes"].as_array().unwrap();
    let names: Vec<&str> = nodes.iter().map(|node| node["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["zlib/1.2.11", "liba/1.0", "virtual"]);
    assert_eq!(nodes[0]["binary"], "missing");
    assert_eq!(nodes[0]["recipe_remote"], "center");
    assert!(json["events"].as_array().unwrap().iter().any(|event| event["event"] == "version_range_solved"));
}

#[test]
fn test_invalid_format_is_rejected() {
    let (_fixture, config) = setup();
    cpkg(&config)
        .args(["graph", "liba/1.0", "--format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid format 'xml'"));
}

#[test]
fn test_lock_then_graph_with_lock() {
    let (fixture, config) = setup();
    let app = fixture.path().join("app");
    let lock = fixture.path().join("out.lock");

    cpkg(&config)
        .arg("lock")
        .arg(&app)
        .arg("--lockfile-out")
        .arg(&lock)
        .assert()
        .success()
        .stdout(predicate::str::contains("Locked 3 nodes"));

    let lockfile = GraphLockFile::load(&lock).unwrap().unwrap();
    assert_eq!(lockfile.root_reference.unwrap().to_string(), "app/1.0");
    assert_eq!(lockfile.graph_lock.nodes.len(), 3);

    // A newer zlib does not leak into the locked graph.
    fixture.add_recipe("center", "zlib/1.5", "").unwrap();
    cpkg(&config)
        .arg("graph")
        .arg(&app)
        .arg("--lockfile")
        .arg(&lock)
        .assert()
        .success()
        .stdout(predicate::str::contains("zlib/1.2.11"))
        .stdout(predicate::str::contains("zlib/1.5").not());
}

#[test]
fn test_lock_into_install_folder_records_identity() {
    let (fixture, config) = setup();
    let build = fixture.path().join("build");

    cpkg(&config)
        .arg("--quiet")
        .arg("lock")
        .arg(fixture.path().join("app"))
        .arg("--install-folder")
        .arg(&build)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(build.join(LOCKFILE_NAME).exists());
    let info = std::fs::read_to_string(build.join(GRAPH_INFO_FILE)).unwrap();
    assert!(info.contains("name = \"app\""));
    assert!(info.contains("version = \"1.0\""));
}

#[test]
fn test_lock_into_install_folder_records_root_options() {
    let (fixture, config) = setup();
    fixture
        .write(
            "app/cpkg.toml",
            "[package]\nname = \"app\"\nversion = \"1.0\"\n\n[options]\nshared = \"False\"\n\n[requirements]\nrequires = [\"liba/1.0\"]\n",
        )
        .unwrap();
    let build = fixture.path().join("build");

    cpkg(&config)
        .arg("lock")
        .arg(fixture.path().join("app"))
        .arg("--install-folder")
        .arg(&build)
        .assert()
        .success();

    let info = GraphInfo::load(&build).unwrap().unwrap();
    assert_eq!(info.options.get("shared").map(String::as_str), Some("False"));
}

#[test]
fn test_unmatched_build_pattern_warns() {
    let (fixture, config) = setup();
    cpkg(&config)
        .arg("graph")
        .arg(fixture.path().join("app"))
        .args(["--build", "missing", "--build", "nothing*"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No package matching 'nothing*' pattern found."));
}

#[test]
fn test_conflict_fails_with_suggestion() {
    let (fixture, config) = setup();
    fixture.add_recipe("cache", "libb/1.0", "[requirements]\nrequires = [\"zlib/1.0\"]\n").unwrap();
    fixture.add_recipe("cache", "zlib/1.0", "").unwrap();

    cpkg(&config)
        .args(["graph", "liba/1.0", "libb/1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conflict in libb/1.0"))
        .stderr(predicate::str::contains("suggestion"));
}

#[test]
fn test_config_from_environment() {
    let (fixture, config) = setup();
    let mut cmd = Command::cargo_bin("cpkg").unwrap();
    cmd.env(CONFIG_ENV, &config)
        .env("NO_COLOR", "1")
        .args(["graph", "zlib/1.2.11"])
        .current_dir(fixture.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("virtual"))
        .stdout(predicate::str::contains("zlib/1.2.11 Missing"));
}

#[test]
fn test_missing_recipe_fails() {
    let (_fixture, config) = setup();
    cpkg(&config)
        .args(["graph", "zlb/1.2.11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to find 'zlb/1.2.11'"));
}
