pub mod client;
pub mod models;
pub mod parser;
pub mod rate_limiter;

pub use crate::config::GitHubConfig;
pub use client::GitHubClient;
pub use parser::{is_github_url, parse_repository_url, RepositoryInfo};
pub use rate_limiter::RateLimiter;
