use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::normalizer::NormalizationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Repository fetch failed: {0}")]
    RepositoryFetch(String),

    #[error("Normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid search query: {0}")]
    QueryValidation(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Get a sanitized error message safe for logging
    /// Filters out potentially sensitive information
    pub fn log_safe(&self) -> String {
        match self {
            // Database errors might contain sensitive schema information
            Error::Database(_) => "Database operation failed".to_string(),
            Error::Migration(_) => "Database migration failed".to_string(),

            // HTTP errors might contain internal URLs or authentication info
            Error::Http(_) => "External HTTP request failed".to_string(),

            Error::Internal(msg) | Error::RepositoryFetch(msg) => {
                let lowered = msg.to_lowercase();
                if lowered.contains("password")
                    || lowered.contains("secret")
                    || lowered.contains("token")
                    || lowered.contains("key")
                {
                    "Error details redacted".to_string()
                } else {
                    self.to_string()
                }
            }

            Error::Normalization(e) => format!("Normalization failed: {e}"),
            Error::Persistence(msg) => format!("Persistence error: {msg}"),
            Error::QueryValidation(msg) => format!("Invalid search query: {msg}"),
            Error::Search(msg) => format!("Search error: {msg}"),
            Error::Tantivy(_) => "Search index error".to_string(),
            Error::InvalidUrl(_) => "Invalid URL provided".to_string(),
            Error::Json(_) => "JSON processing failed".to_string(),
            Error::Io(_) => "File system operation failed".to_string(),
            Error::Config(msg) => format!("Configuration error: {msg}"),
            Error::NotFound(msg) => format!("Not found: {msg}"),
            Error::Validation(msg) => format!("Validation error: {msg}"),
        }
    }

    /// Whether retrying the same write could succeed (lock contention, pool exhaustion)
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            Error::Database(sqlx::Error::Io(_)) => true,
            Error::Database(sqlx::Error::Database(db_err)) => {
                let message = db_err.message().to_lowercase();
                message.contains("locked") || message.contains("busy")
            }
            _ => false,
        }
    }
}

// Implement IntoResponse for API error handling
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!("Request error: {}", self.log_safe());

        let (status, error_message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::Validation(msg) | Error::QueryValidation(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Error::Database(_) | Error::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            Error::Search(_) | Error::Tantivy(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Search error".to_string(),
            ),
            Error::Http(_) | Error::RepositoryFetch(_) => (
                StatusCode::BAD_GATEWAY,
                "External service error".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
