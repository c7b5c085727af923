use std::env;
use std::time::Duration;

use log::warn;

pub const DEFAULT_API_URL: &str = "https://video-downloader-bot-production.up.railway.app/api";
pub const USER_AGENT: &str = concat!("lumen-downloader/", env!("CARGO_PKG_VERSION"));

pub const ENV_API_URL: &str = "LUMEN_API_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "LUMEN_POLL_INTERVAL_MS";
pub const ENV_TIMEOUT_SECS: &str = "LUMEN_TIMEOUT_SECS";

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base of every endpoint, e.g. `https://host/api`
    pub base_url: String,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl ApiConfig {
    /// Config pointing at an explicit base URL, as given (no `/api` suffixing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `LUMEN_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `LUMEN_*` keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_API_URL) {
            if !raw.trim().is_empty() {
                config.base_url = normalize_base_url(&raw);
            }
        }

        if let Some(ms) = parse_u64(&lookup, ENV_POLL_INTERVAL_MS) {
            if ms > 0 {
                config.poll_interval = Duration::from_millis(ms);
            }
        }

        if let Some(secs) = parse_u64(&lookup, ENV_TIMEOUT_SECS) {
            if secs > 0 {
                config.timeout = Duration::from_secs(secs);
            } else {
                warn!("Ignoring {}=0, keeping {:?}", ENV_TIMEOUT_SECS, config.timeout);
            }
        }

        config
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}

/// Turn a deployment URL into the API base: strip the trailing slash and
/// make sure the path ends in `/api`.
pub fn normalize_base_url(raw: &str) -> String {
    let clean = raw.trim().trim_end_matches('/');
    if clean.ends_with("/api") {
        clean.to_string()
    } else {
        format!("{}/api", clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://my-app.railway.app/"),
            "https://my-app.railway.app/api"
        );
        assert_eq!(
            normalize_base_url("https://my-app.railway.app"),
            "https://my-app.railway.app/api"
        );
        assert_eq!(
            normalize_base_url(" https://my-app.railway.app/api/ "),
            "https://my-app.railway.app/api"
        );
    }

    #[test]
    fn test_with_base_url_keeps_path() {
        let config = ApiConfig::with_base_url("http://127.0.0.1:1234/");
        assert_eq!(config.base_url, "http://127.0.0.1:1234");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_durations_keep_defaults() {
        let config = ApiConfig::from_lookup(|key| match key {
            ENV_TIMEOUT_SECS | ENV_POLL_INTERVAL_MS => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ApiConfig::from_lookup(|key| match key {
            ENV_API_URL => Some("https://my-app.railway.app/".to_string()),
            ENV_TIMEOUT_SECS => Some(" 15 ".to_string()),
            ENV_POLL_INTERVAL_MS => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://my-app.railway.app/api");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }
}
