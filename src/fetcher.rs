use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode};

use crate::cache::{CacheStore, cache_key};
use crate::config::SearchConfig;
use crate::data_models::CachedResponse;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::retry::{RetryPolicy, retry_with};

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    ]
});

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0";

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_USER_AGENT)
}

fn jittered(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let extra = rand::thread_rng().gen_range(0.0..=jitter.as_secs_f64());
    base + Duration::from_secs_f64(extra)
}

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub delay: Duration,
    pub jitter: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cache_ttl: chrono::Duration,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        FetcherSettings {
            delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
            timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            cache_ttl: chrono::Duration::hours(24),
        }
    }
}

impl From<&SearchConfig> for FetcherSettings {
    fn from(config: &SearchConfig) -> Self {
        FetcherSettings {
            delay: config.delay,
            jitter: config.jitter,
            timeout: config.request_timeout,
            retry: RetryPolicy::default().with_max_retries(config.max_retries),
            ..FetcherSettings::default()
        }
    }
}

/// Throttled, retrying, cached HTTP GET.
pub struct PageFetcher {
    client: Client,
    cache: Arc<dyn CacheStore>,
    settings: FetcherSettings,
    network_requests: AtomicUsize,
}

impl PageFetcher {
    pub fn new(cache: Arc<dyn CacheStore>, settings: FetcherSettings) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(PageFetcher {
            client,
            cache,
            settings,
            network_requests: AtomicUsize::new(0),
        })
    }

    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    /// Number of requests that actually went out over the network.
    pub fn network_requests(&self) -> usize {
        self.network_requests.load(Ordering::Relaxed)
    }

    /// Fetches a page's HTML.
    pub async fn fetch(&self, url: &str) -> FetchResult<String> {
        self.get(url, &[]).await
    }

    /// GET with extra request headers. A fresh cache entry short-circuits the
    /// network (and the throttle) entirely.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> FetchResult<String> {
        self.get_validated(url, headers, |_| true).await
    }

    /// Like [`get`](Self::get), but only bodies `accept` approves are cached
    /// or served from the cache. A rejected body is still returned so the
    /// caller can report it; the next call goes back to the network.
    pub async fn get_validated<A>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        accept: A,
    ) -> FetchResult<String>
    where
        A: Fn(&str) -> bool,
    {
        let accept_header = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(ACCEPT.as_str()))
            .map(|(_, value)| *value);
        let key = cache_key(url, accept_header);

        if let Some(cached) = self.cache.get(&key) {
            if !cached.is_fresh(Utc::now(), self.settings.cache_ttl) {
                log::debug!("cache entry expired: {url}");
            } else if !accept(&cached.body) {
                log::debug!("cache entry rejected: {url}");
            } else {
                log::debug!("cache hit: {url}");
                return Ok(cached.body);
            }
        }

        let (status, response_headers, body) =
            retry_with(&self.settings.retry, url, |_| self.request_once(url, headers)).await?;

        if accept(&body) {
            self.cache
                .put(&key, CachedResponse::new(status, response_headers, body.clone()));
        } else {
            log::debug!("not caching rejected response from {url}");
        }
        Ok(body)
    }

    async fn request_once(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> FetchResult<(u16, BTreeMap<String, String>, String)> {
        let pause = jittered(self.settings.delay, self.settings.jitter);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let mut request = self.client.get(url).header(USER_AGENT, random_user_agent());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        self.network_requests.fetch_add(1, Ordering::Relaxed);
        log::debug!("GET {url}");
        let response = request
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchError::RateLimited {
                url: url.to_string(),
                retry_after,
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut kept = BTreeMap::new();
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            kept.insert(CONTENT_TYPE.as_str().to_string(), content_type.to_string());
        }

        let body = response.text().await.map_err(|e| self.classify(url, e))?;
        Ok((status.as_u16(), kept, body))
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.settings.timeout,
            }
        } else if err.is_builder() {
            FetchError::InvalidUrl {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: err,
            }
        }
    }
}
