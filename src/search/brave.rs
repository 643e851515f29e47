use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{SearchProvider, SearchRequest, dedup_preserving_order};
use crate::data_models::SearchPage;
use crate::error::ProviderError;
use crate::fetcher::PageFetcher;

pub const BRAVE_BASE_URL: &str = "https://api.search.brave.com";

/// The API caps `count` at 20 and `offset` (a page index) at 9.
const MAX_COUNT: usize = 20;
const MAX_PAGE: usize = 9;

#[derive(Debug, Deserialize, Default)]
pub struct BraveResponse {
    #[serde(default)]
    pub web: Option<BraveWeb>,
    #[serde(default)]
    pub query: Option<BraveQuery>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BraveWeb {
    #[serde(default)]
    pub results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
pub struct BraveResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct BraveQuery {
    #[serde(default)]
    pub more_results_available: bool,
}

/// Brave Search web API. Needs a subscription token.
pub struct BraveSearchProvider {
    fetcher: Arc<PageFetcher>,
    api_key: String,
    base_url: String,
}

impl BraveSearchProvider {
    pub fn new(fetcher: Arc<PageFetcher>, api_key: String) -> Self {
        Self::with_base_url(fetcher, api_key, BRAVE_BASE_URL)
    }

    pub fn with_base_url(
        fetcher: Arc<PageFetcher>,
        api_key: String,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, request: &SearchRequest<'_>) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            &format!("{}/res/v1/web/search", self.base_url),
            &[
                ("q", request.query.to_string()),
                ("count", request.per_page.min(MAX_COUNT).to_string()),
                ("offset", request.page.to_string()),
            ],
        )
        .map_err(|e| ProviderError::Malformed {
            provider: "brave",
            reason: format!("bad search url: {e}"),
        })
    }
}

pub fn parse_response(body: &str, page: usize) -> Result<SearchPage, ProviderError> {
    let response: BraveResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
            provider: "brave",
            reason: format!("invalid json: {e}"),
        })?;
    let urls = response
        .web
        .map(|web| web.results.into_iter().map(|r| r.url).collect::<Vec<_>>())
        .unwrap_or_default();
    let more = response
        .query
        .map(|q| q.more_results_available)
        .unwrap_or(false);
    Ok(SearchPage::new(
        dedup_preserving_order(urls),
        more && page < MAX_PAGE,
    ))
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn fetch_results(&self, request: SearchRequest<'_>) -> Result<SearchPage, ProviderError> {
        if request.page > MAX_PAGE {
            return Ok(SearchPage::default());
        }
        let url = self.search_url(&request)?;
        let body = self
            .fetcher
            .get_validated(
                url.as_str(),
                &[
                    ("Accept", "application/json"),
                    ("X-Subscription-Token", self.api_key.as_str()),
                ],
                |body| serde_json::from_str::<BraveResponse>(body).is_ok(),
            )
            .await
            .map_err(|source| ProviderError::Fetch {
                provider: self.name(),
                source,
            })?;
        let mut page = parse_response(&body, request.page)?;
        page.urls.truncate(request.limit);
        Ok(page)
    }
}
