//! Integration tests for `monobuild build`
//!
//! Runs real shell builds in temporary repositories: dependency order,
//! cache reuse across sessions, failure isolation and the cache write gate.

#![cfg(unix)]

mod common;

use common::{stderr, stdout, TestRepo, WRITABLE_CACHE};

fn chain() -> TestRepo {
    let mut repo = TestRepo::new();
    repo.add_project("@acme/core", "libs/core", &[])
        .add_project("@acme/utils", "libs/utils", &["@acme/core"])
        .add_project("@acme/app", "apps/app", &["@acme/utils"]);
    repo
}

#[test]
fn test_build_in_dependency_order() {
    let repo = chain();

    let output = repo.run(&["build", "--parallelism", "4"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(repo.build_log(), ["@acme/core", "@acme/utils", "@acme/app"]);
    assert_eq!(repo.read_file("apps/app/dist/out.txt"), "built @acme/app\n");
    assert!(repo.file_exists("common/temp/link-map.json"));
    assert!(repo.file_exists("common/temp/logs/app.log"));
    assert!(stdout(&output).contains("3 succeeded"));
}

#[test]
fn test_second_build_uses_cache() {
    let mut repo = chain();
    repo.with_cache_config(WRITABLE_CACHE);

    let first = repo.run(&["build"]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    repo.clear_build_log();
    std::fs::remove_dir_all(repo.path().join("libs/utils/dist")).unwrap();

    let second = repo.run(&["build"]);

    assert!(second.status.success(), "stderr: {}", stderr(&second));
    assert!(repo.build_log().is_empty(), "nothing rebuilt");
    assert!(stdout(&second).contains("3 from cache"));
    assert_eq!(
        repo.read_file("libs/utils/dist/out.txt"),
        "built @acme/utils\n",
        "outputs restored"
    );
}

#[test]
fn test_source_change_rebuilds_dependents_only() {
    let mut repo = chain();
    repo.with_cache_config(WRITABLE_CACHE);
    assert!(repo.run(&["build"]).status.success());
    repo.clear_build_log();

    repo.create_file("libs/utils/src/index.js", "// changed\n");
    let output = repo.run(&["build"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(repo.build_log(), ["@acme/utils", "@acme/app"]);
}

#[test]
fn test_read_only_cache_never_stores() {
    let mut repo = chain();
    repo.with_cache_config(r#"{"cacheProvider": "filesystem"}"#);

    assert!(repo.run(&["build"]).status.success());
    repo.clear_build_log();
    assert!(repo.run(&["build"]).status.success());

    assert_eq!(repo.build_log().len(), 3, "every project rebuilt");
    assert!(!repo.file_exists("common/temp/build-cache"));
}

#[test]
fn test_no_cache_flag() {
    let mut repo = chain();
    repo.with_cache_config(WRITABLE_CACHE);
    assert!(repo.run(&["build"]).status.success());
    repo.clear_build_log();

    let output = repo.run(&["build", "--no-cache"]);

    assert!(output.status.success());
    assert_eq!(repo.build_log().len(), 3);
}

#[test]
fn test_failure_blocks_downstream_only() {
    let mut repo = TestRepo::new();
    repo.add_project("a", "a", &[])
        .add_project("b", "b", &["a"])
        .add_project("c", "c", &[])
        .add_project("d", "d", &["c"]);
    repo.create_file("a/FAIL", "");

    let output = repo.run(&["build", "--json"]);

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let status = |i: usize| report["outcomes"][i]["status"].as_str().unwrap().to_string();
    assert_eq!(status(0), "failed");
    assert_eq!(status(1), "failed");
    assert_eq!(report["outcomes"][1]["blockedBy"], "a");
    assert_eq!(status(2), "succeeded");
    assert_eq!(status(3), "succeeded");

    let mut built = repo.build_log();
    built.sort();
    assert_eq!(built, ["c", "d"]);
}

#[test]
fn test_failure_summary_shows_error() {
    let mut repo = TestRepo::new();
    repo.add_project("a", "a", &[])
        .with_build_command("echo 'type error in index.ts' >&2; exit 2");

    let output = repo.run(&["build"]);

    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("a failed"));
    assert!(text.contains("exit code 2"));
    assert!(text.contains("type error in index.ts"));
}

#[test]
fn test_failed_build_is_not_cached() {
    let mut repo = TestRepo::new();
    repo.add_project("a", "a", &[]).with_cache_config(WRITABLE_CACHE);
    repo.create_file("a/FAIL", "");

    assert!(!repo.run(&["build"]).status.success());

    let cache = repo.path().join("common/temp/build-cache");
    let entries = walkdir::WalkDir::new(&cache)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count();
    assert_eq!(entries, 0);
}

#[test]
fn test_cache_dir_override() {
    let mut repo = chain();
    repo.with_cache_config(WRITABLE_CACHE);
    let shared = tempfile::TempDir::new().unwrap();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_monobuild"))
        .current_dir(repo.path())
        .env("MONOBUILD_TEST_ROOT", repo.path())
        .env("MONOBUILD_BUILD_CACHE_DIR", shared.path())
        .arg("build")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!repo.file_exists("common/temp/build-cache"));
    assert!(std::fs::read_dir(shared.path()).unwrap().count() > 0);
}

#[test]
fn test_invalid_cache_config_fails_before_building() {
    let mut repo = chain();
    repo.with_cache_config(
        r#"{"cacheProvider": "filesystem", "azureBlobStorageConfiguration": {"storageAccountName": "a", "storageContainerName": "b"}}"#,
    );

    let output = repo.run(&["build"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("azureBlobStorageConfiguration"));
    assert!(repo.build_log().is_empty());
}
