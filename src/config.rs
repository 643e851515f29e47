use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::data_models::ListingSystem;
use crate::error::ConfigError;

/// Hard ceiling on search results requested in one run.
pub const MAX_RESULTS_CAP: usize = 1000;

const MAX_SECONDS: f64 = 3600.0;

pub const DEFAULT_CACHE_PATH: &str = ".listing_scout_cache.json";

pub static CONFIG: Lazy<EnvConfig> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    EnvConfig::from_env()
});

/// Settings read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub brave_api_key: Option<String>,
    pub disable_google: bool,
    pub disable_duckduckgo: bool,
    pub cache_path: PathBuf,
}

impl EnvConfig {
    pub fn from_env() -> EnvConfig {
        EnvConfig {
            brave_api_key: get_env_opt("BRAVE_API_KEY"),
            disable_google: get_env_flag("DISABLE_GOOGLE"),
            disable_duckduckgo: get_env_flag("DISABLE_DUCKDUCKGO"),
            cache_path: PathBuf::from(get_env_or_default("LISTING_SCOUT_CACHE", DEFAULT_CACHE_PATH)),
        }
    }
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_env_opt(key).unwrap_or_else(|| default.to_string())
}

fn get_env_flag(key: &str) -> bool {
    get_env_opt(key).is_some_and(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Run-wide knobs. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub target_count: usize,
    pub buildium_threshold: usize,
    pub appfolio_threshold: usize,
    pub results_per_page: usize,
    pub delay: Duration,
    pub jitter: Duration,
    pub result_cap: usize,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            target_count: 10,
            buildium_threshold: 21,
            appfolio_threshold: 20,
            results_per_page: 10,
            delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
            result_cap: MAX_RESULTS_CAP,
            max_retries: 3,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl SearchConfig {
    pub fn threshold_for(&self, system: ListingSystem) -> usize {
        match system {
            ListingSystem::Buildium => self.buildium_threshold,
            ListingSystem::AppFolio => self.appfolio_threshold,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_count == 0 {
            return Err(invalid("target_count", "must be at least 1"));
        }
        if self.results_per_page == 0 || self.results_per_page > 100 {
            return Err(invalid("results_per_page", "must be between 1 and 100"));
        }
        if self.result_cap == 0 || self.result_cap > MAX_RESULTS_CAP {
            return Err(invalid(
                "result_cap",
                &format!("must be between 1 and {MAX_RESULTS_CAP}"),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request_timeout", "must be positive"));
        }
        Ok(())
    }
}

/// Converts a user supplied number of seconds into a `Duration`.
pub fn seconds(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || !(0.0..=MAX_SECONDS).contains(&secs) {
        return Err(invalid(field, "must be between 0 and 3600 seconds"));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        field,
        reason: reason.to_string(),
    }
}
