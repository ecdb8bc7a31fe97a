use crate::config::GitHubConfig;
use crate::github::{
    models::{Commit, Reference, Repository, Tree},
    rate_limiter::RateLimiter,
};
use crate::normalizer::NormalizationError;
use crate::{Error, Result};
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error};

/// GitHub API client
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    config: GitHubConfig,
    rate_limiter: RateLimiter,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: GitHubConfig, user_agent: &str, request_timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(user_agent)
                .map_err(|e| Error::Config(format!("Invalid user agent: {e}")))?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github.v3+json"),
        );

        // Add authentication if token is provided
        if let Some(token) = &config.token {
            let auth_value = format!("Bearer {token}");
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("Invalid GitHub token: {e}")))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;

        let rate_limiter = RateLimiter::new(config.rate_limit_buffer, request_timeout);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Make a GET request to GitHub API
    async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.rate_limiter.wait_if_needed().await?;

        let url = format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path);
        debug!("GitHub API request: GET {}", url);

        let response = self.client.get(&url).send().await?;

        self.rate_limiter
            .update_from_headers(response.headers())
            .await;

        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            error!("GitHub API error: {} - {}", status, error_body);

            return Err(Error::RepositoryFetch(match status {
                StatusCode::NOT_FOUND => format!("GitHub resource not found: {path}"),
                StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                    "GitHub API rate limit exceeded".to_string()
                }
                StatusCode::UNAUTHORIZED => "GitHub authentication failed".to_string(),
                _ => format!("GitHub API error: {status}"),
            }));
        }

        response.json::<T>().await.map_err(|e| {
            Error::RepositoryFetch(format!("Failed to parse GitHub API response: {e}"))
        })
    }

    /// Get repository information
    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository> {
        let path = format!("/repos/{owner}/{repo}");
        self.get(&path).await
    }

    /// Get the latest commit SHA for a branch
    pub async fn get_branch_commit(&self, owner: &str, repo: &str, branch: &str) -> Result<String> {
        let path = format!("/repos/{owner}/{repo}/git/refs/heads/{branch}");
        let reference: Reference = self.get(&path).await?;
        Ok(reference.object.sha)
    }

    /// Get commit information
    pub async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Commit> {
        let path = format!("/repos/{owner}/{repo}/commits/{sha}");
        self.get(&path).await
    }

    /// Get repository tree (recursive file listing)
    pub async fn get_tree(&self, owner: &str, repo: &str, tree_sha: &str) -> Result<Tree> {
        let path = format!("/repos/{owner}/{repo}/git/trees/{tree_sha}?recursive=1");
        self.get(&path).await
    }

    /// Raw content URL of a file at a given commit
    pub fn raw_content_url(&self, owner: &str, repo: &str, sha: &str, path: &str) -> String {
        let encoded_path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "{}/{owner}/{repo}/{sha}/{encoded_path}",
            self.config.raw_base_url.trim_end_matches('/')
        )
    }

    /// Download raw file content from the raw content host.
    /// This doesn't count against rate limits
    pub async fn download_raw_content(&self, url: &str, max_bytes: usize) -> Result<String> {
        debug!("Downloading raw content from: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::RepositoryFetch(format!(
                "Failed to download file: HTTP {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length as usize > max_bytes {
                return Err(NormalizationError::TooLarge {
                    size: content_length as usize,
                    max: max_bytes,
                }
                .into());
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > max_bytes {
            return Err(NormalizationError::TooLarge {
                size: bytes.len(),
                max: max_bytes,
            }
            .into());
        }

        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::RepositoryFetch(format!("Invalid UTF-8 in {url}: {e}")))
    }

    /// Current `(remaining, limit)` API budget
    pub async fn get_rate_limit_status(&self) -> (u32, u32) {
        self.rate_limiter.get_status().await
    }
}
