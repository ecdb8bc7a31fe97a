use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub importer: ImporterConfig,
    pub github: GitHubConfig,
    pub search: SearchConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub external_url: Option<String>,
    pub api_rate_limit: u64,
    /// Repository URLs submitted as import batches when the server starts
    pub auto_import_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// Number of payloads processed in parallel within one batch
    pub item_concurrency: usize,
    /// Upper bound on repository resolution + enumeration
    pub enumeration_timeout_secs: u64,
    /// Per-request timeout for HTTP sources
    pub request_timeout_secs: u64,
    pub max_payload_bytes: usize,
    /// Size limit for a single-document repository holding many recipes
    pub max_document_bytes: usize,
    /// Maximum number of payloads taken from one repository
    pub max_payloads: usize,
    /// Extra attempts when persisting a normalized recipe fails
    pub persist_retries: u32,
    pub persist_backoff_ms: u64,
    /// Permit loopback/private hosts in repository URLs (tests, local mirrors)
    pub allow_private_hosts: bool,
    /// Permit `file://` URLs and absolute paths as repositories
    pub allow_local_paths: bool,
    pub user_agent: String,
}

/// GitHub integration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Optional GitHub personal access token for increased rate limits
    pub token: Option<String>,
    pub api_base_url: String,
    pub raw_base_url: String,
    /// Rate limit buffer - reserve this many requests
    pub rate_limit_buffer: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub index_path: PathBuf,
    /// Cap on term-matched candidates considered for one query
    pub max_search_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub api_max_limit: usize,
    pub api_default_limit: usize,
    pub max_request_body_size: usize,
    pub max_pages: usize, // Maximum pages to prevent overflow
}

fn env_or<T: FromStr>(key: &str, default: &str) -> Result<T> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| Error::Config(format!("Invalid {key} value")))
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/recipes.db".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let external_url = std::env::var("EXTERNAL_URL").ok();

        let auto_import_urls = std::env::var("AUTO_IMPORT_URLS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let index_path = std::env::var("INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        Ok(Settings {
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", "25")?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", "5")?,
                connection_timeout_seconds: env_or("DATABASE_CONNECTION_TIMEOUT", "30")?,
                idle_timeout_seconds: env_or("DATABASE_IDLE_TIMEOUT", "600")?,
                busy_timeout_ms: env_or("DATABASE_BUSY_TIMEOUT_MS", "5000")?,
            },
            server: ServerConfig {
                host,
                port: env_or("PORT", "8083")?,
                external_url,
                api_rate_limit: env_or("API_RATE_LIMIT", "100")?,
                auto_import_urls,
            },
            importer: ImporterConfig {
                item_concurrency: env_or("IMPORT_CONCURRENCY", "8")?,
                enumeration_timeout_secs: env_or("IMPORT_ENUMERATION_TIMEOUT", "120")?,
                request_timeout_secs: env_or("IMPORT_REQUEST_TIMEOUT", "30")?,
                max_payload_bytes: env_or("IMPORT_MAX_PAYLOAD_SIZE", "1048576")?,
                max_document_bytes: env_or("IMPORT_MAX_DOCUMENT_SIZE", "52428800")?,
                max_payloads: env_or("IMPORT_MAX_PAYLOADS", "5000")?,
                persist_retries: env_or("IMPORT_PERSIST_RETRIES", "3")?,
                persist_backoff_ms: env_or("IMPORT_PERSIST_BACKOFF_MS", "100")?,
                allow_private_hosts: env_or("IMPORT_ALLOW_PRIVATE_HOSTS", "false")?,
                allow_local_paths: env_or("IMPORT_ALLOW_LOCAL_PATHS", "false")?,
                user_agent: format!("Recipe-Import/{}", env!("CARGO_PKG_VERSION")),
            },
            github: GitHubConfig {
                token: std::env::var("GITHUB_TOKEN").ok(),
                api_base_url: std::env::var("GITHUB_API_URL")
                    .unwrap_or_else(|_| "https://api.github.com".to_string()),
                raw_base_url: std::env::var("GITHUB_RAW_URL")
                    .unwrap_or_else(|_| "https://raw.githubusercontent.com".to_string()),
                rate_limit_buffer: env_or("GITHUB_RATE_LIMIT_BUFFER", "50")?,
            },
            search: SearchConfig {
                index_path,
                max_search_results: env_or("MAX_SEARCH_RESULTS", "1000")?,
            },
            pagination: PaginationConfig {
                api_max_limit: env_or("API_MAX_LIMIT", "100")?,
                api_default_limit: env_or("API_DEFAULT_LIMIT", "20")?,
                max_request_body_size: env_or("MAX_REQUEST_BODY_SIZE", "1048576")?,
                max_pages: env_or("MAX_PAGES", "10000")?,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("Port must be non-zero".to_string()));
        }

        if self.importer.item_concurrency == 0 {
            return Err(Error::Config(
                "Import concurrency must be non-zero".to_string(),
            ));
        }

        if self.importer.enumeration_timeout_secs == 0 {
            return Err(Error::Config(
                "Enumeration timeout must be non-zero".to_string(),
            ));
        }

        if self.pagination.api_max_limit == 0
            || self.pagination.api_default_limit == 0
            || self.pagination.api_default_limit > self.pagination.api_max_limit
        {
            return Err(Error::Config(
                "API limits must be non-zero and default <= max".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            item_concurrency: 8,
            enumeration_timeout_secs: 120,
            request_timeout_secs: 30,
            max_payload_bytes: 1_048_576,   // 1MB
            max_document_bytes: 52_428_800, // 50MB
            max_payloads: 5000,
            persist_retries: 3,
            persist_backoff_ms: 100,
            allow_private_hosts: false,
            allow_local_paths: false,
            user_agent: format!("Recipe-Import/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: "https://api.github.com".to_string(),
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
            rate_limit_buffer: 50,
        }
    }
}
