use crate::common::{TestEnv, no_prompt};
use nmkup::core::NmkupError;
use nmkup::release::{Selector, SourceKind};
use nmkup::test_utils::GcsObjectFixture;
use nmkup::updater::{UpdateOptions, UpdateOutcome};

#[tokio::test]
async fn test_same_hash_is_up_to_date() {
    let env = TestEnv::new().await;
    env.serve_object(&GcsObjectFixture::new(&env.bundle_url("gcs"), "abc123", 1)).await;
    env.serve_bundle("gcs", 0).await;

    let mut updater = env.updater();
    updater.cache(SourceKind::Gcs).save(&env.gcs_descriptor("abc123")).await.unwrap();

    let outcome = updater
        .run(SourceKind::Gcs, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::UpToDate(_)));
}

#[tokio::test]
async fn test_new_hash_installs_and_records_it() {
    let env = TestEnv::new().await;
    let body = env.serve_bundle("gcs", 1).await;
    let object = GcsObjectFixture::for_body(&env.bundle_url("gcs"), &body);
    env.serve_object(&object).await;

    let mut updater = env.updater();
    updater.cache(SourceKind::Gcs).save(&env.gcs_descriptor("abc123")).await.unwrap();
    updater.cache(SourceKind::Github).save(&env.github_descriptor("v1", 1)).await.unwrap();

    let outcome = updater
        .run(SourceKind::Gcs, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::Installed(_)));
    assert_eq!(env.read_installed("version"), "gcs");

    let cached = updater.cache(SourceKind::Gcs).load().await.unwrap();
    assert_eq!(cached.tag, None);
    assert_eq!(cached.assets[0].content_hash.as_deref(), Some(object.md5_hash.as_str()));
    assert!(!env.cache_file(SourceKind::Github).exists());
}

#[tokio::test]
async fn test_hash_mismatch_after_download_aborts() {
    let env = TestEnv::new().await;
    env.serve_object(&GcsObjectFixture::new(&env.bundle_url("gcs"), "def456", 1)).await;
    env.serve_bundle("gcs", 1).await;

    let mut updater = env.updater();
    updater.cache(SourceKind::Gcs).save(&env.gcs_descriptor("abc123")).await.unwrap();

    let err = updater
        .run(SourceKind::Gcs, &Selector::Latest, &mut no_prompt, UpdateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<NmkupError>(),
        Some(NmkupError::ChecksumMismatch { expected, .. }) if expected == "def456"
    ));
    assert!(!env.install_root().exists());
    assert_eq!(
        updater.cache(SourceKind::Gcs).load().await,
        Some(env.gcs_descriptor("abc123"))
    );
}

#[tokio::test]
async fn test_interactive_lists_the_single_object() {
    let env = TestEnv::new().await;
    let body = env.serve_bundle("gcs", 1).await;
    env.serve_object(&GcsObjectFixture::for_body(&env.bundle_url("gcs"), &body)).await;

    let mut seen = 0;
    let mut prompt = |candidates: &[nmkup::release::ReleaseDescriptor]| -> anyhow::Result<String> {
        seen = candidates.len();
        Ok(String::new())
    };

    let mut updater = env.updater();
    updater
        .run(SourceKind::Gcs, &Selector::Interactive, &mut prompt, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(seen, 1);
}

#[tokio::test]
async fn test_tag_selection_is_unsupported() {
    let env = TestEnv::new().await;

    let mut updater = env.updater();
    let err = updater
        .run(
            SourceKind::Gcs,
            &Selector::Tag("v1".to_string()),
            &mut no_prompt,
            UpdateOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<NmkupError>(),
        Some(NmkupError::UnsupportedSelector { .. })
    ));
}
