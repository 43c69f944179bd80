use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::warn;

use crate::query_cache::{
    CachePolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY,
    DEFAULT_STALE_AFTER,
};

pub const DEFAULT_BASE_URL: &str = "https://rickandmortyapi.com/api";
pub const SETTINGS_FILE: &str = "explorer.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub stale_after_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            stale_after_secs: DEFAULT_STALE_AFTER.as_secs(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY.as_millis() as u64,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY.as_millis() as u64,
            request_timeout_secs: 15,
        }
    }
}

impl Settings {
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            stale_after: Duration::from_secs(self.stale_after_secs),
            retry_attempts: self.retry_attempts,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    stale_after_secs: Option<u64>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the optional settings file, then environment overrides.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(e) => warn!(path = %path.display(), error = %e, "config: ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("EXPLORER_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }

    override_number(&env, "APP__STALE_AFTER_SECS", &mut settings.stale_after_secs);
    override_number(&env, "APP__RETRY_ATTEMPTS", &mut settings.retry_attempts);
    override_number(&env, "APP__RETRY_BASE_DELAY_MS", &mut settings.retry_base_delay_ms);
    override_number(&env, "APP__RETRY_MAX_DELAY_MS", &mut settings.retry_max_delay_ms);
    override_number(&env, "APP__REQUEST_TIMEOUT_SECS", &mut settings.request_timeout_secs);

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.stale_after_secs {
        settings.stale_after_secs = v;
    }
    if let Some(v) = file_cfg.retry_attempts {
        settings.retry_attempts = v;
    }
    if let Some(v) = file_cfg.retry_base_delay_ms {
        settings.retry_base_delay_ms = v;
    }
    if let Some(v) = file_cfg.retry_max_delay_ms {
        settings.retry_max_delay_ms = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

fn override_number<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = env(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value = %raw, "config: ignoring non-numeric override"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
