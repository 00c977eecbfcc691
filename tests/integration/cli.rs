use crate::common::{TestServer, ota_cmd};
use ota_updater::test_utils::{ZipEntry, make_bundle_dir, write_zip, zip_bytes};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, content: &str) {
    fs::write(dir.join("config.toml"), content).unwrap();
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    ota_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn test_name_with_timestamp() {
    let temp = TempDir::new().unwrap();
    ota_cmd(temp.path())
        .args(["name", "android_com.acme_1.0", "--timestamp", "255"])
        .assert()
        .success()
        .stdout("android_com.acme_1.0_ff\n");
}

#[test]
fn test_name_uses_current_time() {
    let temp = TempDir::new().unwrap();
    ota_cmd(temp.path())
        .args(["name", "app"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^app_[0-9a-f]+\n$").unwrap());
}

#[test]
fn test_resolve_without_bundles_prints_builtin() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "resolve"])
        .assert()
        .success()
        .stdout("assets://index.bundle\n");
}

#[test]
fn test_resolve_prints_newest_installed_bundle() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    make_bundle_dir(&root, "1.0", "app_1", "index.bundle").unwrap();
    make_bundle_dir(&root, "1.0", "app_2", "index.bundle").unwrap();

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "resolve"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("file://"))
        .stdout(predicate::str::contains("app_2/index.bundle"));

    // Resolve collects first.
    assert!(!root.join("1.0").join("app_1").exists());
}

#[test]
fn test_resolve_no_cleanup_keeps_old_bundles() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    make_bundle_dir(&root, "1.0", "app_1", "index.bundle").unwrap();
    make_bundle_dir(&root, "1.0", "app_2", "index.bundle").unwrap();

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "resolve", "--no-cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app_2/index.bundle"));

    assert!(root.join("1.0").join("app_1").exists());
}

#[test]
fn test_resolve_newest_without_entry_file_falls_back_to_builtin() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    make_bundle_dir(&root, "1.0", "app_1", "index.bundle").unwrap();
    make_bundle_dir(&root, "1.0", "app_2", "").unwrap();
    write_config(temp.path(), "default_bundle = \"builtin://main.jsbundle\"\n");

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "resolve", "--no-cleanup"])
        .assert()
        .success()
        .stdout("builtin://main.jsbundle\n");
}

#[test]
fn test_current_identifier() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    write_config(temp.path(), "platform = \"ios\"\n");

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "2.1", "--package-id", "com.acme", "current"])
        .assert()
        .success()
        .stdout("ios_com.acme_2.1_0\n");

    make_bundle_dir(&root, "2.1", "ios_com.acme_2.1_1a", "index.bundle").unwrap();
    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .env("OTA_APP_VERSION", "2.1")
        .env("OTA_PACKAGE_ID", "com.acme")
        .arg("current")
        .assert()
        .success()
        .stdout("ios_com.acme_2.1_1a\n");
}

#[test]
fn test_missing_app_version_fails() {
    let temp = TempDir::new().unwrap();
    ota_cmd(temp.path())
        .arg("--root")
        .arg(temp.path().join("root"))
        .arg("resolve")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("app version"))
        .stderr(predicate::str::contains("--app-version"));
}

#[test]
fn test_reserved_app_version_fails() {
    let temp = TempDir::new().unwrap();
    ota_cmd(temp.path())
        .arg("--root")
        .arg(temp.path().join("root"))
        .args(["--app-version", "staging", "current"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid app version"));
}

#[test]
fn test_invalid_config_fails() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), "chunk_size = 1\n");
    ota_cmd(temp.path())
        .args(["name", "app", "--timestamp", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chunk_size"));
}

#[test]
fn test_cleanup() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    make_bundle_dir(&root, "1.0", "app_1", "index.bundle").unwrap();
    make_bundle_dir(&root, "1.1", "app_2", "index.bundle").unwrap();
    make_bundle_dir(&root, "1.1", "app_3", "index.bundle").unwrap();
    fs::create_dir_all(root.join("staging")).unwrap();

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.1", "cleanup"])
        .assert()
        .success()
        .stdout("Removed 2 entries\n");

    assert!(!root.join("1.0").exists());
    assert!(!root.join("1.1").join("app_2").exists());
    assert!(root.join("1.1").join("app_3").exists());
    assert!(root.join("staging").exists());

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.1", "cleanup"])
        .assert()
        .success()
        .stdout("Removed 0 entries\n");
}

#[test]
fn test_status() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no installed bundles"));

    make_bundle_dir(&root, "1.0", "app_a", "index.bundle").unwrap();
    make_bundle_dir(&root, "1.1", "app_b", "").unwrap();

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0 (current)"))
        .stdout(predicate::str::contains("app_a [0xa]"))
        .stdout(predicate::str::contains("missing entry file"));
}

#[test]
fn test_extract() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("bundle.zip");
    write_zip(
        &archive,
        &[
            ZipEntry::File("index.bundle", b"console.log(1)"),
            ZipEntry::Dir("assets/"),
            ZipEntry::File("assets/a.txt", b"a"),
        ],
    )
    .unwrap();
    let dest = temp.path().join("out");

    ota_cmd(temp.path())
        .arg("extract")
        .arg(&archive)
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted 2 files and 1 directories"));

    assert_eq!(fs::read(dest.join("index.bundle")).unwrap(), b"console.log(1)");
}

#[test]
fn test_extract_rejects_traversal() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("bundle.zip");
    write_zip(&archive, &[ZipEntry::File("../../evil.sh", b"rm -rf")]).unwrap();

    ota_cmd(temp.path())
        .arg("extract")
        .arg(&archive)
        .arg(temp.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("../../evil.sh"));

    assert!(!temp.path().join("evil.sh").exists());
}

#[test]
fn test_download() {
    let temp = TempDir::new().unwrap();
    let server = TestServer::start();
    server.route("/b.zip", 200, zip_bytes(&[ZipEntry::File("index.bundle", b"x")]).unwrap());
    server.route("/page", 200, "hello");

    let dest = temp.path().join("b.zip");
    ota_cmd(temp.path())
        .arg("download")
        .arg(server.url("/b.zip"))
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("(zip archive)"));
    assert!(dest.is_file());

    ota_cmd(temp.path())
        .arg("download")
        .arg(server.url("/page"))
        .arg(temp.path().join("page"))
        .assert()
        .success()
        .stdout(predicate::str::contains("(not an archive)"));

    ota_cmd(temp.path())
        .arg("download")
        .arg(server.url("/missing"))
        .arg(temp.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("404"));
}

#[test]
fn test_check_and_update() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    write_config(temp.path(), "platform = \"android\"\n");

    let server = TestServer::start();
    server.publish(
        "android_com.acme_1.0_200",
        zip_bytes(&[ZipEntry::File("index.bundle", b"v2")]).unwrap(),
    );

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "--package-id", "com.acme", "check", "--url"])
        .arg(server.url("/check"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Update available: android_com.acme_1.0_200"));
    assert!(!root.join("1.0").exists());

    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "--package-id", "com.acme", "update"])
        .env("OTA_UPDATE_URL", server.url("/check"))
        .env("OTA_API_KEY", "k-123")
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed android_com.acme_1.0_200"));

    assert_eq!(
        fs::read(root.join("1.0").join("android_com.acme_1.0_200").join("index.bundle")).unwrap(),
        b"v2"
    );
    let checks = server.requests_to("/check");
    assert_eq!(checks.len(), 2);
    assert_eq!(checks[1].headers.get("x-api-key").map(String::as_str), Some("k-123"));

    server.json("/check", &serde_json::json!({ "updateAvailable": false }));
    ota_cmd(temp.path())
        .arg("--root")
        .arg(&root)
        .args(["--app-version", "1.0", "--package-id", "com.acme", "update", "--url"])
        .arg(server.url("/check"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));

    let checks = server.requests_to("/check");
    assert_eq!(checks[2].query_param("filename").as_deref(), Some("android_com.acme_1.0_200"));
}

#[test]
fn test_update_without_url_fails() {
    let temp = TempDir::new().unwrap();
    ota_cmd(temp.path())
        .arg("--root")
        .arg(temp.path().join("root"))
        .args(["--app-version", "1.0", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("update_check_url"));
}
