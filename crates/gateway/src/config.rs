use shelf_client_sdk::DEFAULT_API_BASE_URL;

use crate::session::MAX_SESSION_TTL_SECS;
use tracing::warn;

const DEV_SESSION_SECRET: &str = "shelf_dev_session_secret_change_me";
const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_TABLE_IDLE_SECS: u64 = 30 * 60;

#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the external product API, e.g. `https://api.escuelajs.co/api/v1`.
    pub api_base_url: String,
    /// Signs the session cookie and derives the token sealing key.
    pub session_secret: String,
    /// Service-account token used only by the startup profile probe.
    pub static_access_token: Option<String>,
    pub cookie_secure: bool,
    pub session_ttl_secs: i64,
    /// How long an untouched dashboard table is kept before it is discarded.
    pub table_idle_secs: u64,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_base_url", &self.api_base_url)
            .field("static_access_token", &self.static_access_token.as_ref().map(|_| "<set>"))
            .field("cookie_secure", &self.cookie_secure)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("table_idle_secs", &self.table_idle_secs)
            .finish_non_exhaustive()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_secret: DEV_SESSION_SECRET.to_string(),
            static_access_token: None,
            cookie_secure: false,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            table_idle_secs: DEFAULT_TABLE_IDLE_SECS,
        }
    }
}

impl GatewayConfig {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let session_secret = match non_empty("SESSION_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("SESSION_SECRET is not set; falling back to the development secret");
                defaults.session_secret
            }
        };

        Self {
            api_base_url: non_empty("API_BASE_URL").unwrap_or(defaults.api_base_url),
            session_secret,
            static_access_token: non_empty("STATIC_ACCESS_TOKEN"),
            cookie_secure: non_empty("COOKIE_SECURE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.cookie_secure),
            session_ttl_secs: non_empty("SESSION_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|ttl: &i64| *ttl > 0)
                .map(|ttl| ttl.min(MAX_SESSION_TTL_SECS))
                .unwrap_or(defaults.session_ttl_secs),
            table_idle_secs: non_empty("TABLE_IDLE_SECS")
                .and_then(|v| v.parse().ok())
                .filter(|idle: &u64| *idle > 0)
                .unwrap_or(defaults.table_idle_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = GatewayConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(cfg.session_secret, DEV_SESSION_SECRET);
        assert_eq!(cfg.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert!(cfg.static_access_token.is_none());
        assert!(!cfg.cookie_secure);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let cfg = GatewayConfig::from_lookup(lookup(&[
            ("API_BASE_URL", "http://localhost:9999/api"),
            ("SESSION_SECRET", "s3cr3t"),
            ("STATIC_ACCESS_TOKEN", "svc-token"),
            ("COOKIE_SECURE", "true"),
            ("SESSION_TTL_SECS", "600"),
        ]));
        assert_eq!(cfg.api_base_url, "http://localhost:9999/api");
        assert_eq!(cfg.session_secret, "s3cr3t");
        assert_eq!(cfg.static_access_token.as_deref(), Some("svc-token"));
        assert!(cfg.cookie_secure);
        assert_eq!(cfg.session_ttl_secs, 600);
    }

    #[test]
    fn invalid_numbers_and_blank_values_fall_back() {
        let cfg = GatewayConfig::from_lookup(lookup(&[
            ("SESSION_TTL_SECS", "-5"),
            ("TABLE_IDLE_SECS", "soon"),
            ("STATIC_ACCESS_TOKEN", "   "),
        ]));
        assert_eq!(cfg.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert_eq!(cfg.table_idle_secs, DEFAULT_TABLE_IDLE_SECS);
        assert!(cfg.static_access_token.is_none());
    }

    #[test]
    fn huge_session_ttl_is_clamped() {
        let max = i64::MAX.to_string();
        let cfg = GatewayConfig::from_lookup(lookup(&[("SESSION_TTL_SECS", max.as_str())]));
        assert_eq!(cfg.session_ttl_secs, MAX_SESSION_TTL_SECS);
    }
}
