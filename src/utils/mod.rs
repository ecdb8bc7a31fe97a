// Utility functions
pub mod validation;

pub use validation::validate_repository_url;
