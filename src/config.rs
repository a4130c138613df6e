//! Application-level configuration loaded from the environment.

use std::{env, time::Duration};

use anyhow::{Context, bail};

/// Environment variable holding the HTTP port.
const PORT_ENV: &str = "PORT";
/// Environment variable selecting the deployment environment.
const APP_ENV_ENV: &str = "APP_ENV";
/// Environment variable holding the session signing secret.
const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
/// Environment variable pointing at the Redis instance for the room cache.
const REDIS_URL_ENV: &str = "REDIS_URL";
/// Environment variable overriding the reconnection grace period.
const GRACE_PERIOD_ENV: &str = "GRACE_PERIOD_SECS";
/// Environment variable overriding the cached-room TTL.
const ROOM_TTL_ENV: &str = "ROOM_TTL_SECS";
/// Environment variable overriding the late-answer tolerance.
const ANSWER_TOLERANCE_ENV: &str = "ANSWER_TOLERANCE_MS";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
const DEFAULT_ROOM_TTL_SECS: u64 = 3_600;
const DEFAULT_ANSWER_TOLERANCE_MS: u64 = 2_000;
const DEFAULT_MAX_PLAYERS: usize = 12;

/// Deployment environment the binary runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    /// Local development; secrets are optional.
    Development,
    /// Production-like deployment; required secrets are enforced at startup.
    Production,
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Deployment environment.
    pub app_env: AppEnv,
    /// Secret consumed by the session middleware of the outer auth layer.
    pub session_secret: Option<String>,
    /// Redis URL for the room cache; `None` selects the in-process fallback.
    pub redis_url: Option<String>,
    /// How long a transiently disconnected player keeps their seat.
    pub grace_period: Duration,
    /// TTL applied to cached room snapshots; also the idle-room reaper cutoff.
    pub room_ttl_secs: u64,
    /// Slack added to a question's time limit before a submission is rejected
    /// as late, absorbing client clock skew and transport delay.
    pub answer_tolerance_ms: u64,
    /// Maximum number of seated players per room.
    pub max_players: usize,
}

impl AppConfig {
    /// Load the configuration from process environment variables.
    ///
    /// Fails when `APP_ENV=production` and no session secret is set; the
    /// process must refuse to start rather than run unauthenticated.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let app_env = match lookup(APP_ENV_ENV).as_deref() {
            Some("production") => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let session_secret = lookup(SESSION_SECRET_ENV).filter(|value| !value.is_empty());
        if app_env == AppEnv::Production && session_secret.is_none() {
            bail!("{SESSION_SECRET_ENV} must be set when {APP_ENV_ENV}=production");
        }

        let port = match lookup(PORT_ENV) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid {PORT_ENV} value `{raw}`"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            app_env,
            session_secret,
            redis_url: lookup(REDIS_URL_ENV).filter(|value| !value.is_empty()),
            grace_period: lookup(GRACE_PERIOD_ENV)
                .and_then(|raw| raw.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_GRACE_PERIOD),
            room_ttl_secs: lookup(ROOM_TTL_ENV)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_ROOM_TTL_SECS),
            answer_tolerance_ms: lookup(ANSWER_TOLERANCE_ENV)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_ANSWER_TOLERANCE_MS),
            max_players: DEFAULT_MAX_PLAYERS,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            app_env: AppEnv::Development,
            session_secret: None,
            redis_url: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            room_ttl_secs: DEFAULT_ROOM_TTL_SECS,
            answer_tolerance_ms: DEFAULT_ANSWER_TOLERANCE_MS,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|value| value.to_string())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.grace_period, DEFAULT_GRACE_PERIOD);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn production_without_session_secret_refuses_to_start() {
        let err = AppConfig::from_lookup(lookup_from(&[("APP_ENV", "production")])).unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"));
    }

    #[test]
    fn production_with_secret_is_accepted() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("APP_ENV", "production"),
            ("SESSION_SECRET", "sekrit"),
            ("GRACE_PERIOD_SECS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.app_env, AppEnv::Production);
        assert_eq!(config.grace_period, Duration::from_secs(10));
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")])).is_err());
    }
}
