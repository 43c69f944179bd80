use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn temp_settings_file(contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("catalog_explorer_config_test_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join(SETTINGS_FILE);
    fs::write(&path, contents).expect("write settings");
    path
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(Path::new("/nonexistent/explorer.toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.cache_policy(), CachePolicy::default());
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
}

#[test]
fn file_values_override_defaults_and_env_overrides_file() {
    let path = temp_settings_file(
        "base_url = \"http://localhost:9000/api\"\nstale_after_secs = 60\nretry_attempts = 4\n",
    );

    let from_file = load_settings_from(&path, env_from(&[]));
    assert_eq!(from_file.base_url, "http://localhost:9000/api");
    assert_eq!(from_file.stale_after_secs, 60);
    assert_eq!(from_file.retry_attempts, 4);

    let with_env = load_settings_from(
        &path,
        env_from(&[
            ("APP__BASE_URL", "http://mirror.test/api"),
            ("APP__RETRY_ATTEMPTS", "1"),
        ]),
    );
    assert_eq!(with_env.base_url, "http://mirror.test/api");
    assert_eq!(with_env.retry_attempts, 1);
    assert_eq!(with_env.stale_after_secs, 60);

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn non_numeric_env_values_keep_previous_value() {
    let settings = load_settings_from(
        Path::new("/nonexistent/explorer.toml"),
        env_from(&[
            ("APP__STALE_AFTER_SECS", "soon"),
            ("APP__REQUEST_TIMEOUT_SECS", " 5 "),
        ]),
    );
    assert_eq!(settings.stale_after_secs, Settings::default().stale_after_secs);
    assert_eq!(settings.request_timeout(), Duration::from_secs(5));
}

#[test]
fn malformed_file_is_ignored() {
    let path = temp_settings_file("base_url = [unterminated");
    let settings = load_settings_from(&path, env_from(&[]));
    assert_eq!(settings, Settings::default());
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn cache_policy_reflects_settings() {
    let settings = Settings {
        stale_after_secs: 10,
        retry_attempts: 0,
        retry_base_delay_ms: 250,
        retry_max_delay_ms: 1000,
        ..Settings::default()
    };
    let policy = settings.cache_policy();
    assert_eq!(policy.stale_after, Duration::from_secs(10));
    assert_eq!(policy.retry_attempts, 0);
    assert_eq!(policy.retry_delay(3), Duration::from_secs(1));
}
