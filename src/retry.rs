use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Exponential backoff schedule for transient request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay to wait before retry number `attempt` (1-based), given the delay
    /// used before the previous retry.
    pub fn next_delay(&self, attempt: u32, prior: Option<Duration>) -> Duration {
        let delay = match prior {
            Some(prior) if attempt > 1 => prior.saturating_mul(self.multiplier),
            _ => self.initial_backoff,
        };
        delay.min(self.max_backoff)
    }

    /// Like `next_delay` but never shorter than a server supplied hint.
    pub fn delay_with_hint(
        &self,
        attempt: u32,
        prior: Option<Duration>,
        hint: Option<Duration>,
    ) -> Duration {
        let delay = self.next_delay(attempt, prior);
        match hint {
            Some(hint) => delay.max(hint).min(self.max_backoff),
            None => delay,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// policy runs out of retries. `op` receives the 0-based attempt number.
pub async fn retry_with<T, F, Fut>(policy: &RetryPolicy, url: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut prior: Option<Duration> = None;
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= policy.max_retries => {
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                attempt += 1;
                let delay = policy.delay_with_hint(attempt, prior, err.retry_after());
                log::warn!("{err}; retry {attempt}/{} in {delay:?}", policy.max_retries);
                tokio::time::sleep(delay).await;
                prior = Some(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            multiplier: 2,
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2,
        }
    }

    fn server_error() -> FetchError {
        FetchError::Status {
            url: "http://x".into(),
            status: 503,
        }
    }

    #[test]
    fn test_next_delay_doubles() {
        let p = policy();
        let d1 = p.next_delay(1, None);
        let d2 = p.next_delay(2, Some(d1));
        let d3 = p.next_delay(3, Some(d2));
        assert_eq!(d1, Duration::from_millis(100));
        assert_eq!(d2, Duration::from_millis(200));
        assert_eq!(d3, Duration::from_millis(400));
    }

    #[test]
    fn test_next_delay_is_capped() {
        let p = policy();
        assert_eq!(
            p.next_delay(5, Some(Duration::from_millis(800))),
            Duration::from_millis(1000)
        );
        assert_eq!(
            p.next_delay(6, Some(Duration::from_millis(1000))),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_hint_lengthens_but_never_exceeds_cap() {
        let p = policy();
        assert_eq!(
            p.delay_with_hint(1, None, Some(Duration::from_millis(300))),
            Duration::from_millis(300)
        );
        assert_eq!(
            p.delay_with_hint(1, None, Some(Duration::from_millis(10))),
            Duration::from_millis(100)
        );
        assert_eq!(
            p.delay_with_hint(1, None, Some(Duration::from_secs(60))),
            Duration::from_millis(1000)
        );
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = Cell::new(0u32);
        let result = retry_with(&fast_policy(3), "http://x", |_| {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(server_error())
                } else {
                    Ok("body")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry_with(&fast_policy(2), "http://x", |_| {
            calls.set(calls.get() + 1);
            async { Err(server_error()) }
        })
        .await;
        assert_eq!(calls.get(), 3);
        match result {
            Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry_with(&fast_policy(3), "http://x", |_| {
            calls.set(calls.get() + 1);
            async {
                Err(FetchError::Status {
                    url: "http://x".into(),
                    status: 404,
                })
            }
        })
        .await;
        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }
}
