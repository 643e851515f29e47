use std::time::Duration;
use thiserror::Error;

/// Fatal problems detected before (or while setting up) a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no search provider available (all disabled or misconfigured)")]
    NoSearchProvider,

    #[error("state name must not be empty")]
    EmptyState,

    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure to retrieve a single URL. The collector skips the URL and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Timeouts, connection failures, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Network { .. } => true,
            FetchError::RateLimited { .. } => true,
            FetchError::Status { status, .. } => (500..600).contains(status),
            FetchError::InvalidUrl { .. } | FetchError::Exhausted { .. } => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Failure of one search request. Recovered by falling through to the next
/// provider, or by ending pagination for the query.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: request failed: {source}")]
    Fetch {
        provider: &'static str,
        #[source]
        source: FetchError,
    },

    #[error("{provider}: unexpected response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },

    #[error("every search provider failed for query {query:?}")]
    AllFailed { query: String },

    #[error("search result cap of {cap} reached")]
    CapReached { cap: usize },
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
