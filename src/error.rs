//! Error Handling
//!
//! Error type definitions used in label-juggler

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error types for label-juggler
#[derive(Error, Debug)]
pub enum Error {
    /// The group configuration is missing, malformed, or unparsable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The repository, issue, or pull request no longer exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote system rejected the label removal
    #[error("Label removal failed: {0}")]
    Mutation(String),

    #[error("GitHub API error: {0}")]
    GitHubApi(#[from] octocrab::Error),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Service configuration error: {0}")]
    ConfigValidation(String),

    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid repository format: {0} (expected 'owner/repo')")]
    InvalidRepositoryFormat(String),
}

impl Error {
    /// Create a new group configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Error::Configuration(message.into())
    }

    /// Create a new service configuration validation error
    pub fn config_validation<S: Into<String>>(message: S) -> Self {
        Error::ConfigValidation(message.into())
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Error::NotFound(message.into())
    }

    /// Create a new mutation error
    pub fn mutation<S: Into<String>>(message: S) -> Self {
        Error::Mutation(message.into())
    }
}
