pub mod config;
pub mod db;
pub mod error;

// Ingestion
pub mod github;
pub mod import;
pub mod normalizer;
pub mod source;

// Search
pub mod search;

// HTTP API
pub mod api;

pub mod cli;

// Utilities
pub mod utils;

// Re-exports
pub use config::Settings;
pub use error::{Error, Result};
