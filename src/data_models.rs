use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// Property-management platform whose hosted listing pages we look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSystem {
    Buildium,
    AppFolio,
}

impl ListingSystem {
    pub const ALL: [ListingSystem; 2] = [ListingSystem::Buildium, ListingSystem::AppFolio];

    /// Domain the listing pages are served from.
    pub fn host(&self) -> &'static str {
        match self {
            ListingSystem::Buildium => "managebuilding.com",
            ListingSystem::AppFolio => "appfolio.com",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ListingSystem::Buildium => "Buildium",
            ListingSystem::AppFolio => "AppFolio",
        }
    }
}

impl fmt::Display for ListingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ListingSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buildium" | "managebuilding" => Ok(ListingSystem::Buildium),
            "appfolio" => Ok(ListingSystem::AppFolio),
            other => Err(format!("unknown listing system: {other}")),
        }
    }
}

/// Outcome of counting the qualifying pattern on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualificationResult {
    pub url: String,
    pub passed: bool,
    pub count: usize,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub urls: Vec<String>,
    pub has_more: bool,
}

impl SearchPage {
    pub fn new(urls: Vec<String>, has_more: bool) -> SearchPage {
        SearchPage { urls, has_more }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// A stored HTTP response. Only successful responses end up in the cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(status: u16, headers: BTreeMap<String, String>, body: String) -> CachedResponse {
        CachedResponse {
            status,
            headers,
            body,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: ChronoDuration) -> bool {
        now.signed_duration_since(self.fetched_at) < ttl
    }
}
