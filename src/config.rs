//! Configuration management

use std::str::FromStr;

use anyhow::{self, Context, Result};
use chrono::Duration;

use crate::defaults::{DEFAULT_MAX_SWEEPS, DEFAULT_SERVICE_DURATION_MINUTES};
use crate::services::routing::MapboxConfig;
use crate::services::sequencing::OptimizerConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Mapbox access token (optional, falls back to mock routing if absent)
    pub mapbox_access_token: Option<String>,

    /// Mapbox API base URL
    pub mapbox_base_url: String,

    /// Mapbox routing profile
    pub mapbox_profile: String,

    /// HTTP timeout for routing requests
    pub routing_timeout_seconds: u64,

    /// Service time spent at each stop
    pub service_duration_minutes: i64,

    /// Upper bound on 2-opt sweeps
    pub two_opt_max_sweeps: usize,

    /// Report totals as a closed cycle back to the depot
    pub include_return_edge: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mapbox = MapboxConfig::default();
        Self {
            mapbox_access_token: None,
            mapbox_base_url: mapbox.base_url,
            mapbox_profile: mapbox.profile,
            routing_timeout_seconds: mapbox.timeout_seconds,
            service_duration_minutes: DEFAULT_SERVICE_DURATION_MINUTES,
            two_opt_max_sweeps: DEFAULT_MAX_SWEEPS,
            include_return_edge: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mapbox_access_token = lookup("MAPBOX_ACCESS_TOKEN").filter(|t| !t.trim().is_empty());

        let mapbox_base_url = lookup("MAPBOX_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.mapbox_base_url);

        let mapbox_profile = lookup("MAPBOX_PROFILE").unwrap_or(defaults.mapbox_profile);

        let routing_timeout_seconds = parse_var(&lookup, "ROUTING_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.routing_timeout_seconds);

        let service_duration_minutes: i64 = parse_var(&lookup, "SERVICE_DURATION_MINUTES")?
            .unwrap_or(defaults.service_duration_minutes);
        if service_duration_minutes < 0 {
            anyhow::bail!(
                "SERVICE_DURATION_MINUTES must not be negative (got {})",
                service_duration_minutes
            );
        }
        if Duration::try_minutes(service_duration_minutes).is_none() {
            anyhow::bail!(
                "SERVICE_DURATION_MINUTES is out of range (got {})",
                service_duration_minutes
            );
        }

        let two_opt_max_sweeps = parse_var(&lookup, "TWO_OPT_MAX_SWEEPS")?
            .unwrap_or(defaults.two_opt_max_sweeps);

        let include_return_edge = match lookup("INCLUDE_RETURN_EDGE") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("INCLUDE_RETURN_EDGE has invalid value '{}'", raw))?,
            None => defaults.include_return_edge,
        };

        Ok(Self {
            mapbox_access_token,
            mapbox_base_url,
            mapbox_profile,
            routing_timeout_seconds,
            service_duration_minutes,
            two_opt_max_sweeps,
            include_return_edge,
        })
    }

    /// Mapbox client settings, or `None` when no token is configured
    pub fn mapbox_config(&self) -> Option<MapboxConfig> {
        let token = self.mapbox_access_token.as_ref()?;
        Some(MapboxConfig {
            base_url: self.mapbox_base_url.clone(),
            profile: self.mapbox_profile.clone(),
            timeout_seconds: self.routing_timeout_seconds,
            ..MapboxConfig::new(token.clone())
        })
    }

    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig::default()
            .with_max_sweeps(self.two_opt_max_sweeps)
            .with_return_edge(self.include_return_edge)
    }

    /// Service time per stop, saturating at the largest representable span
    pub fn service_duration(&self) -> Duration {
        Duration::try_minutes(self.service_duration_minutes).unwrap_or(Duration::MAX)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} has invalid value '{}'", key, raw))
        })
        .transpose()
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults_when_nothing_set() {
        let config = config_from(&[]).unwrap();

        assert!(config.mapbox_access_token.is_none());
        assert_eq!(config.mapbox_base_url, "https://api.mapbox.com");
        assert_eq!(config.mapbox_profile, "mapbox/driving-traffic");
        assert_eq!(config.routing_timeout_seconds, 30);
        assert_eq!(config.service_duration(), Duration::minutes(3));
        assert_eq!(config.two_opt_max_sweeps, 50);
        assert!(!config.include_return_edge);
    }

    #[test]
    fn test_config_mapbox_none_without_token() {
        let config = config_from(&[("MAPBOX_ACCESS_TOKEN", "  ")]).unwrap();
        assert!(config.mapbox_config().is_none());
    }

    #[test]
    fn test_config_mapbox_some_when_token_set() {
        let config = config_from(&[
            ("MAPBOX_ACCESS_TOKEN", "pk.test"),
            ("MAPBOX_BASE_URL", "http://localhost:8080/"),
            ("MAPBOX_PROFILE", "mapbox/driving"),
            ("ROUTING_TIMEOUT_SECONDS", "5"),
        ])
        .unwrap();

        let mapbox = config.mapbox_config().unwrap();
        assert_eq!(mapbox.access_token, "pk.test");
        assert_eq!(mapbox.base_url, "http://localhost:8080");
        assert_eq!(mapbox.profile, "mapbox/driving");
        assert_eq!(mapbox.timeout_seconds, 5);
        assert_eq!(mapbox.max_matrix_coordinates, 25);
    }

    #[test]
    fn test_config_optimizer_settings() {
        let config = config_from(&[
            ("TWO_OPT_MAX_SWEEPS", "10"),
            ("INCLUDE_RETURN_EDGE", "true"),
        ])
        .unwrap();

        let optimizer = config.optimizer_config();
        assert_eq!(optimizer.max_sweeps, 10);
        assert!(optimizer.include_return_edge);
        assert!(!optimizer.freeze_first);
    }

    #[test]
    fn test_config_rejects_invalid_number() {
        let err = config_from(&[("TWO_OPT_MAX_SWEEPS", "many")]).unwrap_err();
        assert!(err.to_string().contains("TWO_OPT_MAX_SWEEPS"));
    }

    #[test]
    fn test_config_rejects_negative_service_time() {
        let err = config_from(&[("SERVICE_DURATION_MINUTES", "-2")]).unwrap_err();
        assert!(err.to_string().contains("must not be negative"));
    }

    #[test]
    fn test_config_rejects_out_of_range_service_time() {
        let huge = i64::MAX.to_string();
        let err = config_from(&[("SERVICE_DURATION_MINUTES", huge.as_str())]).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let config = Config {
            service_duration_minutes: i64::MAX,
            ..Config::default()
        };
        assert_eq!(config.service_duration(), Duration::MAX);
    }

    #[test]
    fn test_config_rejects_invalid_flag() {
        assert!(config_from(&[("INCLUDE_RETURN_EDGE", "maybe")]).is_err());
    }

    #[test]
    fn test_config_from_env_reads_process_environment() {
        std::env::set_var("SERVICE_DURATION_MINUTES", "7");

        let config = Config::from_env().unwrap();
        assert_eq!(config.service_duration_minutes, 7);

        // Cleanup
        std::env::remove_var("SERVICE_DURATION_MINUTES");
    }
}
