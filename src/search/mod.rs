//! Search providers and the fallback chain that drives them.
//!
//! Every provider speaks the same small interface: given a query and a page
//! position, return a list of result URLs and whether more pages exist. The
//! [`SearchBackend`] tries providers in priority order and charges every
//! request against a run-wide result budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::config::EnvConfig;
use crate::data_models::SearchPage;
use crate::error::{ConfigError, ProviderError};
use crate::fetcher::PageFetcher;

pub mod brave;
pub mod duckduckgo;
pub mod google;

pub use brave::BraveSearchProvider;
pub use duckduckgo::DuckDuckGoHtmlProvider;
pub use google::GoogleHtmlProvider;

/// One page request handed to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    /// 0-based page index.
    pub page: usize,
    pub per_page: usize,
    /// Upper bound on URLs to return; lower than `per_page` near the cap.
    pub limit: usize,
}

impl SearchRequest<'_> {
    pub fn offset(&self) -> usize {
        self.page * self.per_page
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_results(&self, request: SearchRequest<'_>) -> Result<SearchPage, ProviderError>;
}

/// Counts search results requested across the whole run.
#[derive(Debug)]
pub struct ResultBudget {
    cap: usize,
    used: AtomicUsize,
}

impl ResultBudget {
    pub fn new(cap: usize) -> ResultBudget {
        ResultBudget {
            cap,
            used: AtomicUsize::new(0),
        }
    }

    /// Reserves up to `wanted` results and returns how many were granted.
    pub fn reserve(&self, wanted: usize) -> usize {
        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            let granted = wanted.min(self.cap.saturating_sub(current));
            if granted == 0 {
                return 0;
            }
            match self.used.compare_exchange(
                current,
                current + granted,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return granted,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_exhausted(&self) -> bool {
        self.used() >= self.cap
    }
}

/// Ordered fallback chain of providers sharing one result budget.
pub struct SearchBackend {
    providers: Vec<Box<dyn SearchProvider>>,
    per_page: usize,
    budget: ResultBudget,
}

impl SearchBackend {
    pub fn new(
        providers: Vec<Box<dyn SearchProvider>>,
        per_page: usize,
        result_cap: usize,
    ) -> Result<SearchBackend, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoSearchProvider);
        }
        log::info!(
            "search providers: {}",
            providers.iter().map(|p| p.name()).collect::<Vec<_>>().join(" -> ")
        );
        Ok(SearchBackend {
            providers,
            per_page,
            budget: ResultBudget::new(result_cap),
        })
    }

    pub fn budget(&self) -> &ResultBudget {
        &self.budget
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Returns the first non-empty page any provider produces. Empty `Ok`
    /// means every provider answered but had nothing.
    pub async fn fetch_results(&self, query: &str, page: usize) -> Result<SearchPage, ProviderError> {
        let mut failures = 0usize;
        for provider in &self.providers {
            let limit = self.budget.reserve(self.per_page);
            if limit == 0 {
                return Err(ProviderError::CapReached {
                    cap: self.budget.cap(),
                });
            }
            let request = SearchRequest {
                query,
                page,
                per_page: self.per_page,
                limit,
            };
            match provider.fetch_results(request).await {
                Ok(mut results) if !results.is_empty() => {
                    results.urls.truncate(limit);
                    log::info!(
                        "{} returned {} results for page {} of {:?}",
                        provider.name(),
                        results.urls.len(),
                        page,
                        query
                    );
                    return Ok(results);
                }
                Ok(_) => {
                    log::debug!("{} had no results for {:?} page {}", provider.name(), query, page);
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("{e}");
                }
            }
        }
        if failures == self.providers.len() {
            return Err(ProviderError::AllFailed {
                query: query.to_string(),
            });
        }
        Ok(SearchPage::default())
    }
}

/// Builds the provider chain from the environment: keyed Brave API first,
/// then anonymous Google, then DuckDuckGo as the last resort.
pub fn build_providers(env: &EnvConfig, fetcher: Arc<PageFetcher>) -> Vec<Box<dyn SearchProvider>> {
    let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();
    if let Some(key) = &env.brave_api_key {
        providers.push(Box::new(BraveSearchProvider::new(fetcher.clone(), key.clone())));
    }
    if !env.disable_google {
        providers.push(Box::new(GoogleHtmlProvider::new(fetcher.clone())));
    }
    if !env.disable_duckduckgo {
        providers.push(Box::new(DuckDuckGoHtmlProvider::new(fetcher)));
    }
    providers
}

/// Keeps the first occurrence of every URL.
pub(crate) fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
