use std::collections::HashSet;

use crate::config::SearchConfig;
use crate::data_models::{ListingSystem, SearchPage};
use crate::error::{ConfigError, ProviderError};
use crate::fetcher::PageFetcher;
use crate::qualifier::{Qualifier, QualifyPattern};
use crate::query::{build_queries, normalize_state};
use crate::search::SearchBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Collecting,
    /// Target count reached.
    Done,
    /// Queries or the result cap ran out first.
    Exhausted,
}

/// Reported once per qualifying URL, as soon as it is found.
#[derive(Debug, Clone, Copy)]
pub struct FoundSite<'a> {
    pub system: ListingSystem,
    pub url: &'a str,
    pub count: usize,
    /// 1-based position among this system's qualifying URLs.
    pub index: usize,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOutcome {
    pub system: ListingSystem,
    pub state_name: String,
    pub urls: Vec<String>,
    pub status: CollectorState,
    /// Distinct candidates fetched (or attempted).
    pub examined: usize,
    /// Candidates dropped because the fetch failed.
    pub fetch_failures: usize,
}

/// Pulls candidates from the search backend, fetches and qualifies each one,
/// and stops at the target count.
pub struct Collector<'a> {
    backend: &'a SearchBackend,
    fetcher: &'a PageFetcher,
    config: &'a SearchConfig,
}

impl<'a> Collector<'a> {
    pub fn new(backend: &'a SearchBackend, fetcher: &'a PageFetcher, config: &'a SearchConfig) -> Self {
        Self {
            backend,
            fetcher,
            config,
        }
    }

    pub async fn collect<F>(
        &self,
        state: &str,
        system: ListingSystem,
        mut on_found: F,
    ) -> Result<CollectOutcome, ConfigError>
    where
        F: FnMut(&FoundSite<'_>),
    {
        let state_name = normalize_state(state)?;
        let queries = build_queries(&state_name, system)?;
        let qualifier = Qualifier::new(
            QualifyPattern::for_system(system),
            self.config.threshold_for(system),
        );
        let target = self.config.target_count;

        let mut seen: HashSet<String> = HashSet::new();
        let mut urls: Vec<String> = Vec::new();
        let mut examined = 0usize;
        let mut fetch_failures = 0usize;
        let mut status = CollectorState::Collecting;

        log::info!(
            "collecting {system} sites for {state_name} (target {target}, {} needs >= {} matches)",
            qualifier.pattern().name(),
            qualifier.threshold()
        );

        'queries: for query in &queries {
            let mut page = 0usize;
            loop {
                let SearchPage {
                    urls: candidates,
                    has_more,
                } = match self.backend.fetch_results(query, page).await {
                    Ok(results) => results,
                    Err(ProviderError::CapReached { cap }) => {
                        log::info!("search result cap of {cap} reached");
                        status = CollectorState::Exhausted;
                        break 'queries;
                    }
                    Err(e) => {
                        log::warn!("ending pagination for {query:?}: {e}");
                        break;
                    }
                };
                if candidates.is_empty() {
                    break;
                }

                for url in candidates {
                    if !seen.insert(url.clone()) {
                        continue;
                    }
                    examined += 1;

                    let html = match self.fetcher.fetch(&url).await {
                        Ok(html) => html,
                        Err(e) => {
                            fetch_failures += 1;
                            log::warn!("skipping {url}: {e}");
                            continue;
                        }
                    };

                    let result = qualifier.qualify(&url, &html);
                    if !result.passed {
                        log::debug!("{url}: {} matches, not enough", result.count);
                        continue;
                    }

                    urls.push(url);
                    on_found(&FoundSite {
                        system,
                        url: &result.url,
                        count: result.count,
                        index: urls.len(),
                        target,
                    });
                    if urls.len() >= target {
                        status = CollectorState::Done;
                        break 'queries;
                    }
                }

                if !has_more {
                    break;
                }
                page += 1;
            }
        }

        if status == CollectorState::Collecting {
            status = CollectorState::Exhausted;
        }
        log::info!(
            "{system}: {} of {target} found after examining {examined} candidates ({status:?})",
            urls.len()
        );

        Ok(CollectOutcome {
            system,
            state_name,
            urls,
            status,
            examined,
            fetch_failures,
        })
    }

    /// Runs one collection per system, in order. Only the cache and the
    /// search budget carry over between them.
    pub async fn collect_all<F>(
        &self,
        state: &str,
        systems: &[ListingSystem],
        mut on_found: F,
    ) -> Result<Vec<CollectOutcome>, ConfigError>
    where
        F: FnMut(&FoundSite<'_>),
    {
        let mut outcomes = Vec::with_capacity(systems.len());
        for system in systems {
            outcomes.push(self.collect(state, *system, &mut on_found).await?);
        }
        Ok(outcomes)
    }
}
