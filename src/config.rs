//! Process configuration, read once from the environment at startup.

use std::time::Duration;

use chrono::FixedOffset;

use crate::auth::DEFAULT_ADMINS;
use crate::rate_limit::RateLimitConfig;
use crate::streak::SubmissionWindow;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// IST.
pub const DEFAULT_STREAK_UTC_OFFSET_MINUTES: i32 = 330;
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set")]
    MissingJwtSecret,
    #[error("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} characters long")]
    ShortJwtSecret,
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseSettings>,
    pub admin_identities: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit: RateLimitConfig,
    pub submission_window: SubmissionWindow,
    /// `None` disables the chat endpoints (503).
    pub gemini: Option<GeminiSettings>,
    pub frontend_url: Option<String>,
    pub enable_hsts: bool,
}

fn flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        fn parsed<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
            match raw {
                None => Ok(default),
                Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
            }
        }

        let secret = get("JWT_SECRET").ok_or(ConfigError::MissingJwtSecret)?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::ShortJwtSecret);
        }

        let database = match get("DATABASE_URL") {
            None => None,
            Some(url) => Some(DatabaseSettings {
                url,
                max_connections: parsed("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 5)?,
                connect_attempts: parsed("DB_CONNECT_ATTEMPTS", get("DB_CONNECT_ATTEMPTS"), 3)?,
                connect_backoff: Duration::from_millis(parsed("DB_CONNECT_BACKOFF_MS", get("DB_CONNECT_BACKOFF_MS"), 500)?),
                acquire_timeout: Duration::from_secs(parsed("DB_ACQUIRE_TIMEOUT_SECS", get("DB_ACQUIRE_TIMEOUT_SECS"), 5)?),
            }),
        };

        let admin_identities = match get("ADMIN_IDENTITIES") {
            Some(list) => list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
            None => DEFAULT_ADMINS.iter().map(|s| s.to_string()).collect(),
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            action_limit: parsed("RL_ACTION_LIMIT", get("RL_ACTION_LIMIT"), defaults.action_limit)?,
            action_window: Duration::from_secs(parsed("RL_ACTION_WINDOW", get("RL_ACTION_WINDOW"), defaults.action_window.as_secs())?),
        };

        let offset_minutes: i32 = parsed("STREAK_UTC_OFFSET_MINUTES", get("STREAK_UTC_OFFSET_MINUTES"), DEFAULT_STREAK_UTC_OFFSET_MINUTES)?;
        let offset = FixedOffset::east_opt(offset_minutes * 60).ok_or(ConfigError::Invalid {
            name: "STREAK_UTC_OFFSET_MINUTES",
            value: offset_minutes.to_string(),
        })?;
        let window = SubmissionWindow::default();
        let (cutoff_hour, cutoff_minute) = match get("STREAK_CUTOFF") {
            None => (window.cutoff_hour, window.cutoff_minute),
            Some(raw) => SubmissionWindow::parse_cutoff(&raw).ok_or(ConfigError::Invalid { name: "STREAK_CUTOFF", value: raw })?,
        };

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiSettings {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            api_base: get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
        });

        Ok(Settings {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database,
            admin_identities,
            rate_limit_enabled: get("RATE_LIMIT_ENABLED").map_or(true, |v| flag(&v)),
            rate_limit,
            submission_window: SubmissionWindow::new(cutoff_hour, cutoff_minute, offset),
            gemini,
            frontend_url: get("FRONTEND_URL"),
            enable_hsts: get("ENABLE_HSTS").map_or(false, |v| flag(&v)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_with_only_secret() {
        let s = settings(&[("JWT_SECRET", SECRET)]).unwrap();
        assert_eq!(s.bind_addr, DEFAULT_BIND_ADDR);
        assert!(s.database.is_none());
        assert!(s.gemini.is_none());
        assert!(s.rate_limit_enabled);
        assert_eq!(s.rate_limit.action_limit, 50);
        let window = SubmissionWindow::default();
        assert_eq!((s.submission_window.cutoff_hour, s.submission_window.cutoff_minute), (window.cutoff_hour, window.cutoff_minute));
        assert_eq!(s.submission_window.offset.local_minus_utc(), 330 * 60);
        assert!(s.admin_identities.contains(&"u/kklt3o".to_string()));
        assert!(!s.enable_hsts);
    }

    #[test]
    fn secret_is_required_and_long() {
        assert_eq!(settings(&[]).unwrap_err(), ConfigError::MissingJwtSecret);
        assert_eq!(settings(&[("JWT_SECRET", "short")]).unwrap_err(), ConfigError::ShortJwtSecret);
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgres://localhost/chetana"),
            ("DB_CONNECT_ATTEMPTS", "7"),
            ("ADMIN_IDENTITIES", "u/root, mod@example.org ,"),
            ("RATE_LIMIT_ENABLED", "0"),
            ("STREAK_UTC_OFFSET_MINUTES", "-300"),
            ("STREAK_CUTOFF", "22:30"),
            ("GEMINI_API_KEY", "k"),
        ])
        .unwrap();
        let db = s.database.unwrap();
        assert_eq!(db.connect_attempts, 7);
        assert_eq!(db.max_connections, 5);
        assert_eq!(s.admin_identities, vec!["u/root".to_string(), "mod@example.org".to_string()]);
        assert!(!s.rate_limit_enabled);
        assert_eq!(s.submission_window.cutoff_hour, 22);
        assert_eq!(s.submission_window.cutoff_minute, 30);
        assert_eq!(s.submission_window.offset.local_minus_utc(), -300 * 60);
        assert_eq!(s.gemini.unwrap().model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn env_example_is_a_valid_configuration() {
        let vars: Vec<(&str, &str)> = include_str!("../.env.example")
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .collect();
        assert!(vars.iter().any(|(k, _)| *k == "JWT_SECRET"));
        let s = settings(&vars).unwrap();
        assert_eq!(s.frontend_url.as_deref(), Some("http://localhost:5173"));
        assert_eq!(s.submission_window.offset.local_minus_utc(), DEFAULT_STREAK_UTC_OFFSET_MINUTES * 60);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = settings(&[("JWT_SECRET", SECRET), ("STREAK_CUTOFF", "25:00")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STREAK_CUTOFF", .. }));
        let err = settings(&[("JWT_SECRET", SECRET), ("RL_ACTION_LIMIT", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "RL_ACTION_LIMIT", .. }));
    }
}
