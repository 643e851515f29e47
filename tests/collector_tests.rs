use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listing_scout::cache::{CacheStore, MemoryCache};
use listing_scout::collector::{Collector, CollectorState, FoundSite};
use listing_scout::config::SearchConfig;
use listing_scout::data_models::{ListingSystem, SearchPage};
use listing_scout::error::ProviderError;
use listing_scout::fetcher::{FetcherSettings, PageFetcher};
use listing_scout::retry::RetryPolicy;
use listing_scout::search::{DuckDuckGoHtmlProvider, SearchBackend, SearchProvider, SearchRequest};

mod test_helpers {
    use super::*;

    pub fn fast_fetcher(cache: Arc<dyn CacheStore>) -> Arc<PageFetcher> {
        let settings = FetcherSettings {
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries: 1,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(10),
                multiplier: 2,
            },
            cache_ttl: chrono::Duration::hours(24),
        };
        Arc::new(PageFetcher::new(cache, settings).unwrap())
    }

    pub fn small_config(target: usize) -> SearchConfig {
        SearchConfig {
            target_count: target,
            buildium_threshold: 3,
            appfolio_threshold: 2,
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
            ..SearchConfig::default()
        }
    }

    pub fn price_page(prices: usize) -> String {
        let mut html = String::from("<html><body><h1>Available Rentals</h1>");
        for i in 0..prices {
            html.push_str(&format!("<div><span>Unit {i}</span> <b>$1,{i}50</b></div>"));
        }
        html.push_str("<script>var ads = ['$1', '$2', '$3', '$4'];</script></body></html>");
        html
    }

    pub fn apply_page(buttons: usize) -> String {
        let mut html = String::from("<html><body>");
        for _ in 0..buttons {
            html.push_str("<a class=\"btn\">Apply Now</a>");
        }
        html.push_str("</body></html>");
        html
    }

    /// A DuckDuckGo results page listing `paths` on the mock server.
    pub fn results_page(server: &MockServer, paths: &[&str]) -> String {
        let links: String = paths
            .iter()
            .map(|p| format!(r#"<a class="result__a" href="{}{p}">{p}</a>"#, server.uri()))
            .collect();
        format!("<html><body>{links}</body></html>")
    }

    pub async fn mount_page(server: &MockServer, route: &str, body: String, times: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(times)
            .mount(server)
            .await;
    }

    /// Hands out full pages of never-repeating URLs on the mock server.
    pub struct EndlessProvider {
        pub base: String,
        pub next_id: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for EndlessProvider {
        fn name(&self) -> &'static str {
            "endless"
        }

        async fn fetch_results(&self, request: SearchRequest<'_>) -> Result<SearchPage, ProviderError> {
            let urls = (0..request.per_page)
                .map(|_| {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    format!("{}/candidate/{id}", self.base)
                })
                .collect();
            Ok(SearchPage::new(urls, true))
        }
    }

    /// Returns the same URLs for every query and page.
    pub struct RepeatingProvider {
        pub urls: Vec<String>,
        pub pages: usize,
    }

    #[async_trait]
    impl SearchProvider for RepeatingProvider {
        fn name(&self) -> &'static str {
            "repeating"
        }

        async fn fetch_results(&self, request: SearchRequest<'_>) -> Result<SearchPage, ProviderError> {
            Ok(SearchPage::new(self.urls.clone(), request.page + 1 < self.pages))
        }
    }
}

use test_helpers::*;

#[tokio::test]
async fn test_collects_until_target_in_discovery_order() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/html/",
        results_page(&server, &["/site/1", "/site/2", "/site/3", "/site/4"]),
        1,
    )
    .await;
    mount_page(&server, "/site/1", price_page(5), 1).await;
    mount_page(&server, "/site/2", price_page(1), 1).await;
    mount_page(&server, "/site/3", price_page(3), 1).await;
    // the target is met before the fourth candidate
    mount_page(&server, "/site/4", price_page(9), 0).await;

    let fetcher = fast_fetcher(Arc::new(MemoryCache::new()));
    let backend = SearchBackend::new(
        vec![Box::new(DuckDuckGoHtmlProvider::with_base_url(
            fetcher.clone(),
            server.uri(),
        ))],
        10,
        1000,
    )?;
    let config = small_config(2);
    let collector = Collector::new(&backend, &fetcher, &config);

    let mut reported = Vec::new();
    let outcome = collector
        .collect("oh", ListingSystem::Buildium, |found: &FoundSite<'_>| {
            reported.push((found.index, found.target, found.count, found.url.to_string()));
        })
        .await?;

    let site1 = format!("{}/site/1", server.uri());
    let site3 = format!("{}/site/3", server.uri());
    assert_eq!(outcome.status, CollectorState::Done);
    assert_eq!(outcome.state_name, "Ohio");
    assert_eq!(outcome.urls, vec![site1.clone(), site3.clone()]);
    assert_eq!(outcome.examined, 3);
    assert_eq!(outcome.fetch_failures, 0);
    assert_eq!(reported, vec![(1, 2, 5, site1), (2, 2, 3, site3)]);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_when_queries_run_out() -> Result<()> {
    let server = MockServer::start().await;
    // every one of the three queries gets the same single page
    mount_page(
        &server,
        "/html/",
        results_page(&server, &["/a", "/b", "/broken", "/c"]),
        3,
    )
    .await;
    mount_page(&server, "/a", apply_page(2), 1).await;
    mount_page(&server, "/b", apply_page(1), 1).await;
    mount_page(&server, "/c", apply_page(4), 1).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fast_fetcher(Arc::new(MemoryCache::new()));
    let backend = SearchBackend::new(
        vec![Box::new(DuckDuckGoHtmlProvider::with_base_url(
            fetcher.clone(),
            server.uri(),
        ))],
        10,
        1000,
    )?;
    let config = small_config(10);
    let collector = Collector::new(&backend, &fetcher, &config);

    let outcome = collector
        .collect("Vermont", ListingSystem::AppFolio, |_: &FoundSite<'_>| {})
        .await?;

    assert_eq!(outcome.status, CollectorState::Exhausted);
    assert_eq!(
        outcome.urls,
        vec![format!("{}/a", server.uri()), format!("{}/c", server.uri())]
    );
    // repeats across queries are never refetched
    assert_eq!(outcome.examined, 4);
    assert_eq!(outcome.fetch_failures, 1);
    Ok(())
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/html/",
        results_page(&server, &["/one", "/two"]),
        3,
    )
    .await;
    mount_page(&server, "/one", price_page(4), 1).await;
    mount_page(&server, "/two", price_page(0), 1).await;

    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let config = small_config(5);

    let first = {
        let fetcher = fast_fetcher(cache.clone());
        let backend = SearchBackend::new(
            vec![Box::new(DuckDuckGoHtmlProvider::with_base_url(
                fetcher.clone(),
                server.uri(),
            ))],
            10,
            1000,
        )?;
        let outcome = Collector::new(&backend, &fetcher, &config)
            .collect("Idaho", ListingSystem::Buildium, |_: &FoundSite<'_>| {})
            .await?;
        assert_eq!(fetcher.network_requests(), 5);
        outcome
    };
    let requests_after_first = server.received_requests().await.unwrap_or_default().len();

    let fetcher = fast_fetcher(cache.clone());
    let backend = SearchBackend::new(
        vec![Box::new(DuckDuckGoHtmlProvider::with_base_url(
            fetcher.clone(),
            server.uri(),
        ))],
        10,
        1000,
    )?;
    let second = Collector::new(&backend, &fetcher, &config)
        .collect("Idaho", ListingSystem::Buildium, |_: &FoundSite<'_>| {})
        .await?;

    assert_eq!(second, first);
    assert_eq!(fetcher.network_requests(), 0);
    assert_eq!(
        server.received_requests().await.unwrap_or_default().len(),
        requests_after_first
    );
    Ok(())
}

#[tokio::test]
async fn test_result_cap_spans_both_systems() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>nothing here</p>"))
        .mount(&server)
        .await;

    let fetcher = fast_fetcher(Arc::new(MemoryCache::new()));
    let backend = SearchBackend::new(
        vec![Box::new(EndlessProvider {
            base: server.uri(),
            next_id: AtomicUsize::new(0),
        })],
        10,
        35,
    )?;
    let config = SearchConfig {
        result_cap: 35,
        ..small_config(10)
    };
    let collector = Collector::new(&backend, &fetcher, &config);

    let outcomes = collector
        .collect_all("CO", &ListingSystem::ALL, |_: &FoundSite<'_>| {})
        .await?;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(backend.budget().used(), 35);
    assert_eq!(outcomes[0].system, ListingSystem::Buildium);
    assert_eq!(outcomes[0].examined, 35);
    assert_eq!(outcomes[0].status, CollectorState::Exhausted);
    // nothing left for the second system
    assert_eq!(outcomes[1].examined, 0);
    assert_eq!(outcomes[1].status, CollectorState::Exhausted);
    assert_eq!(fetcher.network_requests(), 35);
    Ok(())
}

#[tokio::test]
async fn test_repeated_candidates_are_fetched_once() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, "/x", apply_page(0), 1).await;
    mount_page(&server, "/y", apply_page(0), 1).await;

    let fetcher = fast_fetcher(Arc::new(MemoryCache::new()));
    let backend = SearchBackend::new(
        vec![Box::new(RepeatingProvider {
            urls: vec![format!("{}/x", server.uri()), format!("{}/y", server.uri())],
            pages: 4,
        })],
        10,
        1000,
    )?;
    let config = small_config(3);
    let outcome = Collector::new(&backend, &fetcher, &config)
        .collect("Maine", ListingSystem::AppFolio, |_: &FoundSite<'_>| {})
        .await?;

    assert!(outcome.urls.is_empty());
    assert_eq!(outcome.examined, 2);
    assert_eq!(outcome.status, CollectorState::Exhausted);
    // three queries, four pages each
    assert_eq!(backend.budget().used(), 120);
    Ok(())
}

#[tokio::test]
async fn test_empty_state_is_rejected() -> Result<()> {
    let fetcher = fast_fetcher(Arc::new(MemoryCache::new()));
    let backend = SearchBackend::new(
        vec![Box::new(RepeatingProvider {
            urls: Vec::new(),
            pages: 1,
        })],
        10,
        1000,
    )?;
    let config = small_config(1);
    let result = Collector::new(&backend, &fetcher, &config)
        .collect("   ", ListingSystem::Buildium, |_: &FoundSite<'_>| {})
        .await;
    assert!(result.is_err());
    assert_eq!(backend.budget().used(), 0);
    Ok(())
}
