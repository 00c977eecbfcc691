use crate::common::TestServer;
use ota_updater::config::{OtaConfig, StaticIdentity};
use ota_updater::download::{HttpFetcher, download};
use ota_updater::test_utils::{ZipEntry, init_test_logging, make_bundle_dir, zip_bytes};
use ota_updater::update::{UpdateCheck, UpdateLock};
use ota_updater::{BundleReference, OtaError, UpdateEngine, UpdateOutcome};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BUNDLE: &str = "android_com.acme_1.0_18c";

fn engine(root: &Path, server: &TestServer) -> UpdateEngine {
    init_test_logging(None);

    let mut config = OtaConfig::with_root(root);
    config.platform = "android".to_string();
    config.update_check_url = Some(server.url("/check"));
    config.api_key = Some("secret-key".to_string());
    config.chunk_size = 512;

    let identity = Arc::new(StaticIdentity::new("1.0", "com.acme").unwrap());
    UpdateEngine::with_defaults(config, identity).unwrap()
}

fn bundle_zip(script: &str) -> Vec<u8> {
    let image: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
    zip_bytes(&[
        ZipEntry::File("index.bundle", script.as_bytes()),
        ZipEntry::Dir("assets/"),
        ZipEntry::File("assets/splash.png", &image),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_full_update_cycle() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.publish(BUNDLE, bundle_zip("console.log('v2')"));
    let engine = engine(temp.path(), &server);

    // Fresh install: the built-in bundle is used.
    assert_eq!(
        engine.load_bundle().await,
        BundleReference::Builtin("assets://index.bundle".to_string())
    );

    let mut progress = Vec::new();
    let outcome = engine.apply_update(|f| progress.push(f)).await.unwrap();

    let bundle_dir = temp.path().join("1.0").join(BUNDLE);
    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            bundle_dir: bundle_dir.clone(),
            entry_file: bundle_dir.join("index.bundle"),
        }
    );
    assert_eq!(
        std::fs::read_to_string(bundle_dir.join("index.bundle")).unwrap(),
        "console.log('v2')"
    );
    assert_eq!(std::fs::read(bundle_dir.join("assets/splash.png")).unwrap().len(), 8192);

    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(1.0));

    // The check carried the synthesized identifier and the api key.
    let checks = server.requests_to("/check");
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].query_param("filename").as_deref(), Some("android_com.acme_1.0_0"));
    assert_eq!(checks[0].headers.get("x-api-key").map(String::as_str), Some("secret-key"));

    // The download followed the signed URL, query string included.
    let downloads = server.requests_to(&format!("/bundles/{BUNDLE}"));
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].query.as_deref(), Some("signature=abc123"));

    assert_eq!(engine.current_identifier(), BUNDLE);
    assert_eq!(
        engine.load_bundle().await,
        BundleReference::Installed(bundle_dir.join("index.bundle"))
    );
    assert!(!temp.path().join("staging").join(format!("{BUNDLE}.zip")).exists());
}

#[tokio::test]
async fn test_newer_bundle_supersedes_installed_one() {
    let temp = TempDir::new().unwrap();
    make_bundle_dir(temp.path(), "1.0", "android_com.acme_1.0_100", "index.bundle").unwrap();
    make_bundle_dir(temp.path(), "0.9", "android_com.acme_0.9_50", "index.bundle").unwrap();

    let server = TestServer::start();
    server.publish("android_com.acme_1.0_200", bundle_zip("v3"));
    let engine = engine(temp.path(), &server);

    engine.apply_update(|_| {}).await.unwrap();

    let checks = server.requests_to("/check");
    assert_eq!(checks[0].query_param("filename").as_deref(), Some("android_com.acme_1.0_100"));

    let mut remaining: Vec<_> = std::fs::read_dir(temp.path().join("1.0"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["android_com.acme_1.0_200"]);
    assert!(!temp.path().join("0.9").exists());
}

#[tokio::test]
async fn test_up_to_date_downloads_nothing() {
    let temp = TempDir::new().unwrap();
    make_bundle_dir(temp.path(), "1.0", "android_com.acme_1.0_1", "index.bundle").unwrap();

    let server = TestServer::start();
    server.json("/check", &serde_json::json!({ "updateAvailable": false }));
    let engine = engine(temp.path(), &server);

    assert_eq!(engine.apply_update(|_| {}).await.unwrap(), UpdateOutcome::UpToDate);
    assert_eq!(server.requests().len(), 1);
    assert!(!temp.path().join("staging").exists());
}

#[tokio::test]
async fn test_signed_url_mismatch_downloads_nothing() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.route("/bundles/other_1", 200, bundle_zip("x"));
    server.json(
        "/check",
        &serde_json::json!({
            "updateAvailable": true,
            "signedUrl": server.url("/bundles/other_1"),
            "filename": BUNDLE,
        }),
    );
    let engine = engine(temp.path(), &server);

    let err = engine.apply_update(|_| {}).await.unwrap_err();
    assert!(matches!(err, OtaError::SignedUrlMismatch { .. }));
    assert!(server.requests_to("/bundles/other_1").is_empty());
    assert!(!temp.path().join("1.0").exists());
}

#[tokio::test]
async fn test_check_server_error() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.route("/check", 503, "unavailable");
    let engine = engine(temp.path(), &server);

    let err = engine.check_for_update().await.unwrap_err();
    assert!(matches!(err, OtaError::HttpStatus { status: 503, .. }));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_check_invalid_json() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.route("/check", 200, "<html>login</html>");
    let engine = engine(temp.path(), &server);

    let err = engine.check_for_update().await.unwrap_err();
    assert!(matches!(err, OtaError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_missing_bundle_keeps_current() {
    let temp = TempDir::new().unwrap();
    make_bundle_dir(temp.path(), "1.0", "android_com.acme_1.0_1", "index.bundle").unwrap();

    let server = TestServer::start();
    server.json(
        "/check",
        &serde_json::json!({
            "updateAvailable": true,
            "signedUrl": server.url(&format!("/bundles/{BUNDLE}")),
            "filename": BUNDLE,
        }),
    );
    let engine = engine(temp.path(), &server);

    let err = engine.apply_update(|_| {}).await.unwrap_err();
    assert!(matches!(err, OtaError::HttpStatus { status: 404, .. }));
    assert_eq!(engine.current_identifier(), "android_com.acme_1.0_1");
    assert!(!temp.path().join("1.0").join(BUNDLE).exists());
}

#[tokio::test]
async fn test_html_payload_is_rejected() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.publish(BUNDLE, b"<html>expired signature</html>".to_vec());
    let engine = engine(temp.path(), &server);

    let err = engine.apply_update(|_| {}).await.unwrap_err();
    assert!(matches!(err, OtaError::NotAnArchive { .. }));
    assert!(!temp.path().join("staging").join(format!("{BUNDLE}.zip")).exists());
    assert!(!temp.path().join("1.0").join(BUNDLE).exists());
}

#[tokio::test]
async fn test_update_while_locked() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.publish(BUNDLE, bundle_zip("v2"));
    let engine = engine(temp.path(), &server);

    let held = UpdateLock::try_acquire(temp.path()).await.unwrap();
    let err = engine.apply_update(|_| {}).await.unwrap_err();
    assert!(matches!(err, OtaError::UpdateInProgress { .. }));
    assert!(server.requests_to(&format!("/bundles/{BUNDLE}")).is_empty());

    drop(held);
    assert!(matches!(engine.apply_update(|_| {}).await.unwrap(), UpdateOutcome::Installed { .. }));
}

#[tokio::test]
async fn test_check_reports_available() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.publish(BUNDLE, bundle_zip("v2"));
    let engine = engine(temp.path(), &server);

    match engine.check_for_update().await.unwrap() {
        UpdateCheck::Available {
            signed_url,
            filename,
        } => {
            assert_eq!(filename, BUNDLE);
            assert!(signed_url.ends_with("?signature=abc123"));
        }
        UpdateCheck::UpToDate => panic!("expected an update"),
    }
}

#[tokio::test]
async fn test_http_download_pipeline() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    let payload = bundle_zip("v2");
    server.route("/b.zip", 200, payload.clone());
    server.route("/page", 200, "plain text");

    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(10)).unwrap());

    let dest = temp.path().join("b.zip");
    let mut progress = Vec::new();
    let is_archive = download(fetcher.clone(), server.url("/b.zip"), &dest, 1000)
        .finish(|f| progress.push(f))
        .await
        .unwrap();
    assert!(is_archive);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
    assert_eq!(progress.last().copied(), Some(1.0));

    let dest = temp.path().join("page");
    let is_archive = download(fetcher.clone(), server.url("/page"), &dest, 1000)
        .finish(|_| {})
        .await
        .unwrap();
    assert!(!is_archive);

    let err = download(fetcher, server.url("/missing"), temp.path().join("m"), 1000)
        .finish(|_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, OtaError::HttpStatus { status: 404, .. }));
}
