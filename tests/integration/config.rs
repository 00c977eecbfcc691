use ota_updater::config::{CONFIG_ENV_VAR, OtaConfig};
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

struct EnvGuard;

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        // SAFETY: every test touching the process environment is #[serial].
        unsafe { std::env::set_var(CONFIG_ENV_VAR, value) };
        Self
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see `EnvGuard::set`.
        unsafe { std::env::remove_var(CONFIG_ENV_VAR) };
    }
}

#[tokio::test]
#[serial]
async fn test_config_from_env_var() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ota.toml");
    std::fs::write(
        &path,
        r#"
root = "/var/lib/acme/ota"
update_check_url = "https://updates.example.com/check"
platform = "android"
chunk_size = 8192
"#,
    )
    .unwrap();

    let _guard = EnvGuard::set(&path);
    let config = OtaConfig::load().await.unwrap();

    assert_eq!(config.root, PathBuf::from("/var/lib/acme/ota"));
    assert_eq!(config.update_check_url().unwrap(), "https://updates.example.com/check");
    assert_eq!(config.platform, "android");
    assert_eq!(config.chunk_size, 8192);
    assert_eq!(config.entry_file, "index.bundle");
}

#[tokio::test]
#[serial]
async fn test_explicit_path_wins_over_env_var() {
    let temp = TempDir::new().unwrap();
    let from_env = temp.path().join("env.toml");
    let explicit = temp.path().join("explicit.toml");
    std::fs::write(&from_env, "platform = \"ios\"\n").unwrap();
    std::fs::write(&explicit, "platform = \"android\"\n").unwrap();

    let _guard = EnvGuard::set(&from_env);
    let config = OtaConfig::load_with_optional(Some(explicit)).await.unwrap();
    assert_eq!(config.platform, "android");
}

#[tokio::test]
#[serial]
async fn test_missing_env_config_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let _guard = EnvGuard::set(&temp.path().join("absent.toml"));

    let config = OtaConfig::load().await.unwrap();
    assert_eq!(config, OtaConfig::default());
}

#[tokio::test]
async fn test_save_and_reload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");

    let mut config = OtaConfig::with_root(temp.path().join("root"));
    config.api_key = Some("k".to_string());
    config.save_to(&path).await.unwrap();

    assert_eq!(OtaConfig::load_from(&path).await.unwrap(), config);
}
