// src/config.rs

use crate::core::error::ConfigError;
use crate::logging::PROJECT_NAME;
use std::str::FromStr;
use std::time::Duration;

/// Per-probe deadlines. The slowest one bounds a whole analysis.
#[derive(Debug, Clone)]
pub struct ProbeTimeouts {
    pub dns: Duration,
    pub tls: Duration,
    pub head: Duration,
    pub redirects: Duration,
    pub performance: Duration,
    pub whois: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            dns: Duration::from_secs(5),
            tls: Duration::from_secs(5),
            head: Duration::from_secs(5),
            redirects: Duration::from_secs(10),
            performance: Duration::from_secs(10),
            whois: Duration::from_secs(10),
        }
    }
}

/// Every tunable of the engine. Scoring weights are not here on purpose:
/// they live next to the scorer as constants.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache_ttl: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: usize,
    pub timeouts: ProbeTimeouts,
    /// Per-request deadline inside the redirect walk.
    pub redirect_hop_timeout: Duration,
    pub max_redirects: usize,
    pub max_bulk_urls: usize,
    pub user_agent: String,
    pub typo_max_distance: usize,
    /// Host asked for a TLD's WHOIS server.
    pub whois_bootstrap: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 30,
            timeouts: ProbeTimeouts::default(),
            redirect_hop_timeout: Duration::from_secs(5),
            max_redirects: 10,
            max_bulk_urls: 10,
            user_agent: "LinkScanner/2.0".to_string(),
            typo_max_distance: crate::core::typosquat::MAX_TYPO_DISTANCE,
            whois_bootstrap: "whois.iana.org".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `LINKSCANNER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64>(&lookup, "CACHE_TTL_SECS")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>(&lookup, "RATE_LIMIT_MAX")? {
            config.rate_limit_max_requests = max;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RATE_LIMIT_WINDOW_SECS")? {
            config.rate_limit_window = Duration::from_secs(secs);
        }
        if let Some(agent) = lookup(&env_key("USER_AGENT")).filter(|a| !a.trim().is_empty()) {
            config.user_agent = agent;
        }

        Ok(config)
    }
}

fn env_key(suffix: &str) -> String {
    format!("{}_{suffix}", *PROJECT_NAME)
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    suffix: &str,
) -> Result<Option<T>, ConfigError> {
    let key = env_key(suffix);
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw,
                expected: "a non-negative integer",
            }),
    }
}
