use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::limit::{self, ResolvedLimit, DEFAULT_MAX_CONCURRENT_DOWNLOADS};

fn default_max_concurrent_downloads() -> usize {
    DEFAULT_MAX_CONCURRENT_DOWNLOADS
}

fn default_retry_hint_secs() -> u64 {
    crate::coordinator::DEFAULT_RETRY_HINT_SECS
}

fn default_cancel_poll_interval_ms() -> u64 {
    crate::coordinator::DEFAULT_CANCEL_POLL_INTERVAL.as_millis() as u64
}

/// Global configuration loaded from `~/.config/acq/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcqConfig {
    /// Pool width used when `ACQ_MAX_CONCURRENT_DOWNLOADS` is unset or invalid.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
    /// Seconds quoted in "currently being downloaded, retry in N seconds" messages.
    #[serde(default = "default_retry_hint_secs")]
    pub retry_hint_secs: u64,
    /// How often claim watchers check for cancellation, in milliseconds.
    #[serde(default = "default_cancel_poll_interval_ms")]
    pub cancel_poll_interval_ms: u64,
    /// Default destination for artifact batches (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

impl Default for AcqConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent_downloads(),
            retry_hint_secs: default_retry_hint_secs(),
            cancel_poll_interval_ms: default_cancel_poll_interval_ms(),
            download_dir: None,
        }
    }
}

impl AcqConfig {
    /// Env var if valid, else the configured width if in range, else the default.
    pub fn resolve_limit(&self) -> ResolvedLimit {
        limit::limit_from_env(limit::validate_default(self.max_concurrent_downloads))
    }

    pub fn cancel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cancel_poll_interval_ms.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("acq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AcqConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<AcqConfig> {
    if !path.exists() {
        let default_cfg = AcqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: AcqConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limit::{LimitSource, CONCURRENCY_ENV_VAR};
    use std::sync::Mutex;

    // Tests in this module that touch the process environment hold this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn resolve_with(env: Option<&str>, configured: usize) -> ResolvedLimit {
        match env {
            Some(v) => std::env::set_var(CONCURRENCY_ENV_VAR, v),
            None => std::env::remove_var(CONCURRENCY_ENV_VAR),
        }
        let cfg = AcqConfig {
            max_concurrent_downloads: configured,
            ..AcqConfig::default()
        };
        cfg.resolve_limit()
    }

    #[test]
    fn default_config_values() {
        let cfg = AcqConfig::default();
        assert_eq!(cfg.max_concurrent_downloads, 10);
        assert_eq!(cfg.retry_hint_secs, 15);
        assert_eq!(cfg.cancel_poll_interval_ms, 50);
        assert!(cfg.download_dir.is_none());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: AcqConfig = toml::from_str("max_concurrent_downloads = 4").unwrap();
        assert_eq!(cfg.max_concurrent_downloads, 4);
        assert_eq!(cfg.retry_hint_secs, 15);
        assert_eq!(cfg.cancel_poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent_downloads = 3
            retry_hint_secs = 30
            cancel_poll_interval_ms = 0
            download_dir = "/var/tmp/acq"
        "#;
        let cfg: AcqConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.retry_hint_secs, 30);
        assert_eq!(cfg.cancel_poll_interval(), Duration::from_millis(1));
        assert_eq!(cfg.download_dir.as_deref(), Some(Path::new("/var/tmp/acq")));
    }

    #[test]
    fn limit_precedence_env_then_config_then_default() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = std::env::var(CONCURRENCY_ENV_VAR).ok();

        let cases = [
            (Some("7"), 4, 7, LimitSource::Env),
            (Some("abc"), 4, 4, LimitSource::Default),
            (Some("0"), 4, 4, LimitSource::Default),
            (Some("101"), 4, 4, LimitSource::Default),
            (None, 4, 4, LimitSource::Default),
            (None, 0, 10, LimitSource::Default),
            (Some("0"), 500, 10, LimitSource::Default),
            (Some("100"), 0, 100, LimitSource::Env),
        ];
        let mut seen = Vec::new();
        for (env, configured, _, _) in cases {
            seen.push(resolve_with(env, configured));
        }

        match saved {
            Some(v) => std::env::set_var(CONCURRENCY_ENV_VAR, v),
            None => std::env::remove_var(CONCURRENCY_ENV_VAR),
        }
        for ((env, configured, value, source), got) in cases.into_iter().zip(seen) {
            assert_eq!(
                got,
                ResolvedLimit { value, source },
                "env {:?}, configured {}",
                env,
                configured
            );
        }
    }

    #[test]
    fn load_or_init_creates_then_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let created = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, AcqConfig::default());

        fs::write(&path, "max_concurrent_downloads = 7\nretry_hint_secs = 5\n").unwrap();
        let loaded = load_or_init_at(&path).unwrap();
        assert_eq!(loaded.max_concurrent_downloads, 7);
        assert_eq!(loaded.retry_hint_secs, 5);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_concurrent_downloads = \"many\"").unwrap();
        let err = load_or_init_at(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
    }
}
