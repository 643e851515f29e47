use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};

use super::{SearchProvider, SearchRequest, dedup_preserving_order};
use crate::data_models::SearchPage;
use crate::error::ProviderError;
use crate::fetcher::PageFetcher;

pub const DUCKDUCKGO_BASE_URL: &str = "https://html.duckduckgo.com";

/// Scrapes the JavaScript-free DuckDuckGo results page. No key required.
pub struct DuckDuckGoHtmlProvider {
    fetcher: Arc<PageFetcher>,
    base_url: String,
}

impl DuckDuckGoHtmlProvider {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self::with_base_url(fetcher, DUCKDUCKGO_BASE_URL)
    }

    pub fn with_base_url(fetcher: Arc<PageFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, request: &SearchRequest<'_>) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            &format!("{}/html/", self.base_url),
            &[
                ("q", request.query.to_string()),
                ("s", request.offset().to_string()),
            ],
        )
        .map_err(|e| ProviderError::Malformed {
            provider: "duckduckgo",
            reason: format!("bad search url: {e}"),
        })
    }
}

/// Result anchors point at `//duckduckgo.com/l/?uddg=<target>`; unwrap them.
pub fn resolve_result_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

/// The bot check DuckDuckGo serves, with HTTP 200, instead of results.
pub fn is_anomaly_page(html: &str) -> bool {
    html.contains("anomaly-modal") || html.contains("bots use DuckDuckGo too")
}

pub fn parse_results(html: &str) -> SearchPage {
    let document = Html::parse_document(html);
    let (Ok(link_selector), Ok(next_selector)) = (
        Selector::parse("a.result__a"),
        // the previous-page form sits in a div.nav-link too
        Selector::parse("div.nav-link form input[type='submit'][value='Next']"),
    ) else {
        return SearchPage::default();
    };

    let urls = document
        .select(&link_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(resolve_result_href)
        .collect::<Vec<String>>();
    let has_more = document.select(&next_selector).next().is_some();

    SearchPage::new(dedup_preserving_order(urls), has_more)
}

#[async_trait]
impl SearchProvider for DuckDuckGoHtmlProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn fetch_results(&self, request: SearchRequest<'_>) -> Result<SearchPage, ProviderError> {
        let url = self.search_url(&request)?;
        let html = self
            .fetcher
            .get_validated(url.as_str(), &[], |body| !is_anomaly_page(body))
            .await
            .map_err(|source| ProviderError::Fetch {
                provider: self.name(),
                source,
            })?;
        if is_anomaly_page(&html) {
            return Err(ProviderError::Malformed {
                provider: self.name(),
                reason: format!("bot check served for query: {}", request.query),
            });
        }
        let mut page = parse_results(&html);
        page.urls.truncate(request.limit);
        Ok(page)
    }
}
