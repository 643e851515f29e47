use std::path::PathBuf;

use clap::Parser;

use crate::config::{SearchConfig, seconds};
use crate::data_models::ListingSystem;
use crate::error::ConfigError;

/// Find active Buildium and AppFolio rental listing sites for a US state.
#[derive(Debug, Parser)]
#[command(name = "listing-scout", version, about)]
pub struct Args {
    /// State name or two-letter abbreviation. Prompted for when omitted.
    pub state: Option<String>,

    /// Qualifying URLs to collect per listing system.
    #[arg(long, default_value_t = 10)]
    pub target: usize,

    /// Visible price markers a Buildium page needs.
    #[arg(long, default_value_t = 21)]
    pub buildium_threshold: usize,

    /// "Apply now" occurrences an AppFolio page needs.
    #[arg(long, default_value_t = 20)]
    pub appfolio_threshold: usize,

    /// Search results requested per page.
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    /// Base pause before each request, in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub delay: f64,

    /// Extra random pause of up to this many seconds.
    #[arg(long, default_value_t = 0.5)]
    pub jitter: f64,

    /// Retries for timeouts, 5xx and 429 responses.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout, in seconds.
    #[arg(long, default_value_t = 15.0)]
    pub timeout: f64,

    /// Listing systems to search (repeatable). Defaults to both.
    #[arg(long = "system", value_parser = parse_system)]
    pub systems: Vec<ListingSystem>,

    /// Response cache file. Overrides LISTING_SCOUT_CACHE.
    #[arg(long)]
    pub cache_path: Option<PathBuf>,

    /// Keep the response cache in memory only.
    #[arg(long)]
    pub no_cache: bool,

    /// Debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_system(s: &str) -> Result<ListingSystem, String> {
    s.parse()
}

impl Args {
    pub fn search_config(&self) -> Result<SearchConfig, ConfigError> {
        let config = SearchConfig {
            target_count: self.target,
            buildium_threshold: self.buildium_threshold,
            appfolio_threshold: self.appfolio_threshold,
            results_per_page: self.batch_size,
            delay: seconds("delay", self.delay)?,
            jitter: seconds("jitter", self.jitter)?,
            max_retries: self.max_retries,
            request_timeout: seconds("timeout", self.timeout)?,
            ..SearchConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn systems(&self) -> Vec<ListingSystem> {
        if self.systems.is_empty() {
            return ListingSystem::ALL.to_vec();
        }
        let mut systems = Vec::new();
        for system in &self.systems {
            if !systems.contains(system) {
                systems.push(*system);
            }
        }
        systems
    }
}
