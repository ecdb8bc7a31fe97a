use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Tracks the GitHub API budget reported in response headers
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<RwLock<RateLimitState>>,
    buffer: u32,
    /// Longest pause accepted before giving up on the request
    max_wait: Duration,
}

#[derive(Debug, Clone)]
struct RateLimitState {
    limit: u32,
    remaining: u32,
    /// Unix timestamp when rate limit resets
    reset_at: i64,
}

impl RateLimiter {
    pub fn new(buffer: u32, max_wait: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(RateLimitState {
                limit: 60, // Default for unauthenticated requests
                remaining: 60,
                reset_at: Utc::now().timestamp() + 3600,
            })),
            buffer,
            max_wait,
        }
    }

    /// Update rate limit from GitHub API response headers
    pub async fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let header_value = |name: &str| -> Option<i64> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
        };

        let mut state = self.state.write().await;
        if let Some(limit) = header_value("x-ratelimit-limit") {
            state.limit = limit.max(0) as u32;
        }
        if let Some(remaining) = header_value("x-ratelimit-remaining") {
            state.remaining = remaining.max(0) as u32;
        }
        if let Some(reset) = header_value("x-ratelimit-reset") {
            state.reset_at = reset;
        }

        debug!(
            "Rate limit updated: {}/{} (resets at {})",
            state.remaining, state.limit, state.reset_at
        );
    }

    async fn should_wait(&self) -> bool {
        let state = self.state.read().await;
        // Use the minimum of buffer or 10% of limit to handle low rate limits
        let threshold = std::cmp::min(self.buffer, (state.limit / 10).max(5));
        state.remaining <= threshold
    }

    /// Wait for the budget to reset when it is nearly spent.
    ///
    /// Fails instead of sleeping when the reset is further away than
    /// `max_wait`.
    pub async fn wait_if_needed(&self) -> Result<()> {
        if !self.should_wait().await {
            return Ok(());
        }

        let (remaining, limit, reset_at) = {
            let state = self.state.read().await;
            (state.remaining, state.limit, state.reset_at)
        };

        let now = Utc::now().timestamp();
        if now >= reset_at {
            return Ok(());
        }

        let wait = Duration::from_secs((reset_at - now) as u64);
        if wait > self.max_wait {
            return Err(Error::RepositoryFetch(format!(
                "GitHub API rate limit exhausted ({remaining}/{limit}), resets in {} seconds",
                wait.as_secs()
            )));
        }

        warn!(
            "Rate limit approaching ({}/{}), waiting {} seconds until reset",
            remaining,
            limit,
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;
        Ok(())
    }

    /// Current `(remaining, limit)`
    pub async fn get_status(&self) -> (u32, u32) {
        let state = self.state.read().await;
        (state.remaining, state.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn headers(remaining: &str, reset: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert(
            "x-ratelimit-remaining",
            HeaderValue::from_str(remaining).unwrap(),
        );
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&reset.to_string()).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_update_from_headers() {
        let limiter = RateLimiter::new(50, Duration::from_secs(60));
        limiter
            .update_from_headers(&headers("4321", Utc::now().timestamp() + 600))
            .await;
        assert_eq!(limiter.get_status().await, (4321, 5000));
        assert!(limiter.wait_if_needed().await.is_ok());
    }

    #[tokio::test]
    async fn test_exhausted_budget_fails_fast() {
        let limiter = RateLimiter::new(50, Duration::from_secs(60));
        limiter
            .update_from_headers(&headers("0", Utc::now().timestamp() + 3600))
            .await;

        let result = limiter.wait_if_needed().await;
        assert!(matches!(result, Err(Error::RepositoryFetch(_))));
    }

    #[tokio::test]
    async fn test_past_reset_does_not_wait() {
        let limiter = RateLimiter::new(50, Duration::from_secs(60));
        limiter
            .update_from_headers(&headers("0", Utc::now().timestamp() - 10))
            .await;
        assert!(limiter.wait_if_needed().await.is_ok());
    }
}
