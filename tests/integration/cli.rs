use crate::common::TestEnv;
use assert_cmd::Command;
use nmkup::release::SourceKind;
use predicates::prelude::*;

fn nmkup() -> Command {
    let mut cmd = Command::cargo_bin("nmkup").unwrap();
    cmd.env("NMKUP_NO_PROGRESS", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    nmkup()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--rollback"));
}

#[test]
fn test_tag_and_interactive_conflict() {
    nmkup().args(["v1.0", "--interactive"]).assert().failure();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_clear_cache() {
    let env = TestEnv::new().await;
    let config = env.write_config();
    let updater = env.updater();
    updater.cache(SourceKind::Github).save(&env.github_descriptor("v1", 1)).await.unwrap();
    updater.cache(SourceKind::Gcs).save(&env.gcs_descriptor("abc123")).await.unwrap();

    nmkup()
        .arg("--config")
        .arg(&config)
        .arg("--clear-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 2 cache record(s)"));

    assert!(!env.cache_file(SourceKind::Github).exists());
    assert!(!env.cache_file(SourceKind::Gcs).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rollback_without_backup_fails() {
    let env = TestEnv::new().await;
    let config = env.write_config();

    nmkup()
        .arg("-c")
        .arg(&config)
        .arg("--rollback")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No backup found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_check_reports_available_update() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 0).await;
    let config = env.write_config();

    nmkup()
        .arg("-c")
        .arg(&config)
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Update available: v2"));

    assert!(!env.install_root().exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_install_from_command_line() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 1).await;
    let config = env.write_config();

    nmkup()
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed v2 from github"));

    assert_eq!(env.read_installed("version"), "v2");
    assert!(env.cache_file(SourceKind::Github).exists());
}
