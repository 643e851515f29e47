use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};

use super::{SearchProvider, SearchRequest, dedup_preserving_order};
use crate::data_models::SearchPage;
use crate::error::ProviderError;
use crate::fetcher::PageFetcher;

pub const GOOGLE_BASE_URL: &str = "https://www.google.com";

/// Scrapes Google's HTML results page anonymously.
pub struct GoogleHtmlProvider {
    fetcher: Arc<PageFetcher>,
    base_url: String,
}

impl GoogleHtmlProvider {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self::with_base_url(fetcher, GOOGLE_BASE_URL)
    }

    pub fn with_base_url(fetcher: Arc<PageFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, request: &SearchRequest<'_>) -> Result<Url, ProviderError> {
        Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[
                ("q", request.query.to_string()),
                ("num", request.per_page.to_string()),
                ("start", request.offset().to_string()),
                ("hl", "en".to_string()),
            ],
        )
        .map_err(|e| ProviderError::Malformed {
            provider: "google",
            reason: format!("bad search url: {e}"),
        })
    }
}

fn is_google_host(url: &Url) -> bool {
    url.host_str().is_some_and(|host| {
        host == "google.com"
            || host.ends_with(".google.com")
            || host.starts_with("google.")
            || host.contains(".google.")
            || host.ends_with("googleusercontent.com")
            || host.ends_with("gstatic.com")
    })
}

/// Organic results are either direct links or `/url?q=<target>` redirects.
pub fn resolve_result_href(href: &str) -> Option<String> {
    if let Some(rest) = href.strip_prefix("/url?") {
        let parsed = Url::parse(&format!("https://www.google.com/url?{rest}")).ok()?;
        let target = parsed
            .query_pairs()
            .find(|(k, _)| k == "q" || k == "url")
            .map(|(_, v)| v.into_owned())?;
        return resolve_result_href(&target);
    }
    let url = Url::parse(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") || is_google_host(&url) {
        return None;
    }
    Some(url.to_string())
}

/// The block page Google serves to automated clients.
pub fn is_captcha_page(html: &str) -> bool {
    html.contains("unusual traffic from your computer network")
        || html.contains("id=\"captcha-form\"")
        || html.contains("/sorry/index")
}

pub fn parse_results(html: &str) -> SearchPage {
    let document = Html::parse_document(html);
    let (Ok(a_tag_selector), Ok(next_selector)) =
        (Selector::parse("#search a[href]"), Selector::parse("a#pnnext"))
    else {
        return SearchPage::default();
    };

    let urls = document
        .select(&a_tag_selector)
        .filter_map(|tag| tag.value().attr("href"))
        .filter_map(resolve_result_href)
        .collect::<Vec<String>>();
    let has_more = document.select(&next_selector).next().is_some();

    SearchPage::new(dedup_preserving_order(urls), has_more)
}

#[async_trait]
impl SearchProvider for GoogleHtmlProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn fetch_results(&self, request: SearchRequest<'_>) -> Result<SearchPage, ProviderError> {
        let url = self.search_url(&request)?;
        let html = self
            .fetcher
            .get_validated(url.as_str(), &[], |body| !is_captcha_page(body))
            .await
            .map_err(|source| ProviderError::Fetch {
                provider: self.name(),
                source,
            })?;
        if is_captcha_page(&html) {
            return Err(ProviderError::Malformed {
                provider: self.name(),
                reason: format!("blocked by captcha on query: {}", request.query),
            });
        }
        let mut page = parse_results(&html);
        page.urls.truncate(request.limit);
        Ok(page)
    }
}
