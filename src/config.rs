//! Runtime configuration for the admin console.
//!
//! Every value has a default and can be overridden from the environment.
//! Numeric values are clamped to a sane range instead of rejected.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://campus-schield-backend-api.vercel.app/api/v1/admin";

/// Users and reports refresh cadence.
pub const DEFAULT_DATA_INTERVAL_SECS: u64 = 10;

/// Siren alert refresh cadence.
pub const DEFAULT_SIREN_INTERVAL_SECS: u64 = 5;

/// How long a siren keeps sounding unless silenced first.
pub const DEFAULT_SIREN_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

const MIN_INTERVAL_SECS: u64 = 1;
const MAX_INTERVAL_SECS: u64 = 3600;
const MAX_SIREN_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct AdminConfig {
    pub api_url: String,
    pub state_dir: PathBuf,
    pub data_interval: Duration,
    pub siren_interval: Duration,
    pub siren_timeout: Duration,
    pub siren_sound: Option<PathBuf>,
    pub quiet_cold_start: bool,
    pub http_timeout: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            state_dir: default_state_dir(),
            data_interval: Duration::from_secs(DEFAULT_DATA_INTERVAL_SECS),
            siren_interval: Duration::from_secs(DEFAULT_SIREN_INTERVAL_SECS),
            siren_timeout: Duration::from_secs(DEFAULT_SIREN_TIMEOUT_SECS),
            siren_sound: None,
            quiet_cold_start: false,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl AdminConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |name: &str, default: u64, max: u64| {
            let value = match var(name).and_then(|v| v.parse::<u64>().ok()) {
                Some(v) => v.clamp(MIN_INTERVAL_SECS, max),
                None => default,
            };
            Duration::from_secs(value)
        };

        Self {
            api_url: var("CAMPUS_SHIELD_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            state_dir: var("CAMPUS_SHIELD_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_state_dir),
            data_interval: secs(
                "CAMPUS_SHIELD_DATA_INTERVAL_SECS",
                DEFAULT_DATA_INTERVAL_SECS,
                MAX_INTERVAL_SECS,
            ),
            siren_interval: secs(
                "CAMPUS_SHIELD_SIREN_INTERVAL_SECS",
                DEFAULT_SIREN_INTERVAL_SECS,
                MAX_INTERVAL_SECS,
            ),
            siren_timeout: secs(
                "CAMPUS_SHIELD_SIREN_TIMEOUT_SECS",
                DEFAULT_SIREN_TIMEOUT_SECS,
                MAX_SIREN_TIMEOUT_SECS,
            ),
            siren_sound: var("CAMPUS_SHIELD_SIREN_SOUND").map(PathBuf::from),
            quiet_cold_start: var("CAMPUS_SHIELD_QUIET_COLD_START")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            http_timeout: secs(
                "CAMPUS_SHIELD_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
                MAX_INTERVAL_SECS,
            ),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("campus-shield-admin"))
        .unwrap_or_else(|| PathBuf::from(".campus-shield-admin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AdminConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AdminConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_dashboard_cadence() {
        let config = config_from(&[]);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.data_interval, Duration::from_secs(10));
        assert_eq!(config.siren_interval, Duration::from_secs(5));
        assert_eq!(config.siren_timeout, Duration::from_secs(10));
        assert!(!config.quiet_cold_start);
        assert!(config.siren_sound.is_none());
    }

    #[test]
    fn overrides_are_trimmed_and_clamped() {
        let config = config_from(&[
            ("CAMPUS_SHIELD_API_URL", " http://localhost:3000/api/v1/admin/ "),
            ("CAMPUS_SHIELD_DATA_INTERVAL_SECS", "0"),
            ("CAMPUS_SHIELD_SIREN_TIMEOUT_SECS", "99999"),
            ("CAMPUS_SHIELD_QUIET_COLD_START", "yes"),
        ]);
        assert_eq!(config.api_url, "http://localhost:3000/api/v1/admin");
        assert_eq!(config.data_interval, Duration::from_secs(1));
        assert_eq!(config.siren_timeout, Duration::from_secs(600));
        assert!(config.quiet_cold_start);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config_from(&[("CAMPUS_SHIELD_SIREN_INTERVAL_SECS", "soon")]);
        assert_eq!(config.siren_interval, Duration::from_secs(5));
    }
}
