use crate::error::{Error, Result};
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP fetcher with retry logic and exponential backoff
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    initial_backoff: Duration,
}

impl Fetcher {
    pub fn new(user_agent: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    /// Fetch a URL as text, retrying transient failures
    pub async fn fetch_text(&self, url: &str, max_bytes: usize) -> Result<String> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.fetch_once(url, max_bytes).await {
                Ok(content) => return Ok(content),
                Err(e) if retries < self.max_retries && Self::is_retryable(&e) => {
                    retries += 1;
                    warn!(
                        "Fetch failed (attempt {}/{}): {}. Retrying in {:?}",
                        retries,
                        self.max_retries,
                        e.log_safe(),
                        backoff
                    );
                    sleep(backoff).await;
                    backoff *= 2; // Exponential backoff
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str, max_bytes: usize) -> Result<String> {
        debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(content_length) = response.content_length() {
            if content_length > max_bytes as u64 {
                return Err(Error::RepositoryFetch(format!(
                    "Response size {content_length} exceeds maximum {max_bytes}"
                )));
            }
        }

        Self::read_with_limit(response, max_bytes).await
    }

    async fn read_with_limit(response: Response, max_bytes: usize) -> Result<String> {
        let bytes = response.bytes().await?;

        if bytes.len() > max_bytes {
            return Err(Error::RepositoryFetch(format!(
                "Response size {} exceeds maximum {}",
                bytes.len(),
                max_bytes
            )));
        }

        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::RepositoryFetch(format!("Invalid UTF-8 in response: {e}")))
    }

    fn is_retryable(error: &Error) -> bool {
        match error {
            // Retry on network errors, timeouts and server errors
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}
