use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Directory source (CSV) listing one row per recipient group
    pub directory_path: PathBuf,

    /// Where archived sent copies are written
    pub archive_dir: PathBuf,

    /// Where per-run audit logs are written
    pub log_dir: PathBuf,

    /// Persisted failure set used by `retry-failed`
    pub state_file: PathBuf,

    /// Root of the filesystem spool transport
    pub spool_dir: PathBuf,

    /// Body font: a preset name (`yahei`, `simsun`, ...) or a CSS font-family list
    pub font_family: String,

    /// Body font size in points
    pub font_pt: u32,

    /// Archive a durable copy of every sent message
    pub archive_enabled: bool,

    /// How long to wait for a sent message to appear in the sent store (min 10)
    pub poll_seconds: u64,

    /// Interval between sent-store queries in milliseconds (min 200)
    pub poll_interval_ms: u64,

    /// Number of archive save attempts (min 1)
    pub save_retries: u32,

    /// Wait between archive save attempts in milliseconds (min 500)
    pub save_wait_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            directory_path: PathBuf::from("mail_config.csv"),
            archive_dir: PathBuf::from("sent_msgs"),
            log_dir: PathBuf::from("logs"),
            state_file: PathBuf::from("mailrun_state.json"),
            spool_dir: PathBuf::from("spool"),
            font_family: "yahei".to_string(),
            font_pt: 10,
            archive_enabled: true,
            poll_seconds: 120,
            poll_interval_ms: 1200,
            save_retries: 4,
            save_wait_ms: 3000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            directory_path: env_path("MAILRUN_DIRECTORY", defaults.directory_path),
            archive_dir: env_path("MAILRUN_ARCHIVE_DIR", defaults.archive_dir),
            log_dir: env_path("MAILRUN_LOG_DIR", defaults.log_dir),
            state_file: env_path("MAILRUN_STATE_FILE", defaults.state_file),
            spool_dir: env_path("MAILRUN_SPOOL_DIR", defaults.spool_dir),
            font_family: std::env::var("MAILRUN_FONT_FAMILY").unwrap_or(defaults.font_family),
            font_pt: env_parse("MAILRUN_FONT_PT", defaults.font_pt)?,
            archive_enabled: env_parse("MAILRUN_ARCHIVE_ENABLED", defaults.archive_enabled)?,
            poll_seconds: env_parse("MAILRUN_POLL_SECONDS", defaults.poll_seconds)?,
            poll_interval_ms: env_parse("MAILRUN_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            save_retries: env_parse("MAILRUN_SAVE_RETRIES", defaults.save_retries)?,
            save_wait_ms: env_parse("MAILRUN_SAVE_WAIT_MS", defaults.save_wait_ms)?,
        })
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var_os(key).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                key,
                std::any::type_name::<T>()
            )
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.font_pt, 10);
        assert_eq!(config.poll_seconds, 120);
        assert_eq!(config.poll_interval_ms, 1200);
        assert_eq!(config.save_retries, 4);
        assert!(config.archive_enabled);
    }

    #[test]
    fn test_env_parse_falls_back_when_unset() {
        let value: u64 = env_parse("MAILRUN_TEST_SURELY_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }
}
