use crate::common::{BUNDLE, TestEnv, no_prompt};
use nmkup::core::NmkupError;
use nmkup::release::{ReleaseDescriptor, Selector, SourceKind};
use nmkup::updater::{Stage, UpdateOptions, UpdateOutcome};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn error_of(err: &anyhow::Error) -> Option<&NmkupError> {
    err.chain().find_map(|e| e.downcast_ref::<NmkupError>())
}

#[tokio::test]
async fn test_install_then_up_to_date() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 1).await;

    let mut updater = env.updater();
    let outcome = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Installed(env.github_descriptor("v2", 100)));
    assert_eq!(env.read_installed("version"), "v2");
    assert_eq!(updater.stage(), Stage::Done);

    // Second run: same tag, same asset metadata, no download.
    let outcome = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::UpToDate(_)));
    assert_eq!(updater.stage(), Stage::UpToDate);
}

#[tokio::test]
async fn test_cached_release_skips_download() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 0).await;

    let mut updater = env.updater();
    updater.cache(SourceKind::Github).save(&env.github_descriptor("v2", 100)).await.unwrap();

    let outcome = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::UpToDate(_)));
    assert!(!env.install_root().exists());
}

#[tokio::test]
async fn test_reuploaded_asset_reinstalls() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 101)).await;
    env.serve_bundle("v2", 1).await;

    let mut updater = env.updater();
    updater.cache(SourceKind::Github).save(&env.github_descriptor("v2", 100)).await.unwrap();

    let outcome = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::Installed(_)));
    assert_eq!(
        updater.cache(SourceKind::Github).load().await,
        Some(env.github_descriptor("v2", 101))
    );
}

#[tokio::test]
async fn test_force_reinstalls_current_release() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 1).await;

    let mut updater = env.updater();
    updater.cache(SourceKind::Github).save(&env.github_descriptor("v2", 100)).await.unwrap();

    let options = UpdateOptions {
        force: true,
        ..UpdateOptions::default()
    };
    let outcome =
        updater.run(SourceKind::Github, &Selector::Latest, &mut no_prompt, options).await.unwrap();

    assert!(matches!(outcome, UpdateOutcome::Installed(_)));
}

#[tokio::test]
async fn test_install_by_tag() {
    let env = TestEnv::new().await;
    let without_bundle = nmkup::test_utils::GithubReleaseFixture::new("v3").asset(
        "notes.txt",
        "https://example.com/notes.txt",
        3,
        crate::common::T1,
    );
    env.serve_releases(&[without_bundle, env.release("v2", 100), env.release("v1", 90)])
        .await;
    env.serve_bundle("v1", 1).await;

    let mut updater = env.updater();
    let outcome = updater
        .run(
            SourceKind::Github,
            &Selector::Tag("v1".to_string()),
            &mut no_prompt,
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Installed(env.github_descriptor("v1", 90)));
    assert_eq!(env.read_installed("version"), "v1");

    // v3 exists but carries no bundle.
    let err = updater
        .run(
            SourceKind::Github,
            &Selector::Tag("v3".to_string()),
            &mut no_prompt,
            UpdateOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        error_of(&err),
        Some(&NmkupError::ReleaseNotFound {
            tag: "v3".to_string()
        })
    );
}

#[tokio::test]
async fn test_interactive_selection() {
    let env = TestEnv::new().await;
    env.serve_releases(&[env.release("v2", 100), env.release("v1", 90)]).await;
    env.serve_bundle("v1", 1).await;

    let mut shown = Vec::new();
    let mut prompt = |candidates: &[ReleaseDescriptor]| -> anyhow::Result<String> {
        shown = candidates.iter().map(|c| c.label().to_string()).collect();
        Ok("2\n".to_string())
    };

    let mut updater = env.updater();
    let outcome = updater
        .run(SourceKind::Github, &Selector::Interactive, &mut prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(shown, ["v2", "v1"]);
    assert!(matches!(outcome, UpdateOutcome::Installed(r) if r.label() == "v1"));
}

#[tokio::test]
async fn test_interactive_out_of_range() {
    let env = TestEnv::new().await;
    env.serve_releases(&[env.release("v2", 100)]).await;
    env.serve_bundle("v2", 0).await;

    let mut prompt = |_: &[ReleaseDescriptor]| -> anyhow::Result<String> { Ok("5".to_string()) };

    let mut updater = env.updater();
    let err = updater
        .run(SourceKind::Github, &Selector::Interactive, &mut prompt, UpdateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error_of(&err), Some(NmkupError::InvalidSelection { count: 1, .. })));
    assert_eq!(updater.stage(), Stage::Error);
}

#[tokio::test]
async fn test_no_release_with_bundle_leaves_cache() {
    let env = TestEnv::new().await;
    let release = nmkup::test_utils::GithubReleaseFixture::new("v3").asset(
        "other.zip",
        "https://example.com/other.zip",
        3,
        crate::common::T1,
    );
    env.serve_latest(&release).await;

    let mut updater = env.updater();
    let previous = env.github_descriptor("v2", 100);
    updater.cache(SourceKind::Github).save(&previous).await.unwrap();

    let err = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        error_of(&err),
        Some(&NmkupError::NoUpdatableRelease {
            asset: BUNDLE.to_string()
        })
    );
    assert_eq!(updater.cache(SourceKind::Github).load().await, Some(previous));
}

#[tokio::test]
async fn test_install_invalidates_gcs_cache() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 1).await;

    let mut updater = env.updater();
    updater.cache(SourceKind::Gcs).save(&env.gcs_descriptor("abc123")).await.unwrap();

    updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(
        updater.cache(SourceKind::Github).load().await,
        Some(env.github_descriptor("v2", 100))
    );
    assert!(!env.cache_file(SourceKind::Gcs).exists());
}

#[tokio::test]
async fn test_api_error_is_fetch_failure() {
    let env = TestEnv::new().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/releases/latest", crate::common::REPO_PATH)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&env.server)
        .await;

    let mut updater = env.updater();
    let err = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error_of(&err), Some(NmkupError::FetchFailure { .. })));
}

#[tokio::test]
async fn test_unrecognised_root_needs_force() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 1).await;

    std::fs::create_dir_all(env.install_root()).unwrap();
    std::fs::write(env.install_root().join("notes.txt"), "mine").unwrap();

    let mut updater = env.updater();
    let err = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error_of(&err), Some(NmkupError::UnsafeInstallRoot { .. })));

    let options = UpdateOptions {
        force: true,
        ..UpdateOptions::default()
    };
    updater.run(SourceKind::Github, &Selector::Latest, &mut no_prompt, options).await.unwrap();

    assert_eq!(env.read_installed("version"), "v2");
    assert_eq!(env.read_installed("notes.txt"), "mine");
}

#[tokio::test]
async fn test_git_checkout_is_refused() {
    let env = TestEnv::new().await;
    std::fs::create_dir_all(env.install_root().join(".git")).unwrap();

    let mut updater = env.updater();
    let err = updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error_of(&err), Some(NmkupError::ManagedByGit { .. })));
}

#[tokio::test]
async fn test_update_removes_files_dropped_from_bundle() {
    let env = TestEnv::new().await;
    env.serve_latest(&env.release("v2", 100)).await;
    env.serve_bundle("v2", 1).await;

    let root = env.install_root();
    std::fs::create_dir_all(root.join("legacy")).unwrap();
    std::fs::write(root.join("legacy/old.sh"), "old").unwrap();
    std::fs::write(root.join("version"), "v1").unwrap();
    std::fs::write(root.join(".installed-files"), "./legacy\n./legacy/old.sh\n./version\n")
        .unwrap();

    let mut updater = env.updater();
    updater
        .run(SourceKind::Github, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert!(!root.join("legacy").exists());
    assert_eq!(env.read_installed("version"), "v2");
    assert!(!updater.cache_dir().join(BUNDLE).exists());
}

#[tokio::test]
async fn test_tag_found_on_later_page() {
    let env = TestEnv::new().await;
    let releases_path = format!("{}/releases", crate::common::REPO_PATH);
    let next = format!("{}{releases_path}?per_page=100&page=2", env.server.uri());

    let first: Vec<_> = ["v5", "v4"].iter().map(|tag| env.release(tag, 100).to_json()).collect();
    Mock::given(method("GET"))
        .and(path(releases_path.as_str()))
        .and(query_param("per_page", "100"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", format!("<{next}>; rel=\"next\"").as_str())
                .set_body_json(first),
        )
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path(releases_path.as_str()))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![env.release("v1", 90).to_json()]))
        .with_priority(1)
        .expect(1)
        .mount(&env.server)
        .await;
    env.serve_bundle("v1", 1).await;

    let mut updater = env.updater();
    let outcome = updater
        .run(
            SourceKind::Github,
            &Selector::Tag("v1".to_string()),
            &mut no_prompt,
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Installed(env.github_descriptor("v1", 90)));
    assert_eq!(env.read_installed("version"), "v1");
}
