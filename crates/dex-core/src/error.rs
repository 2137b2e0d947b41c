//! Unified error handling for dex-core

use thiserror::Error;

/// Core error type for dex-core
#[derive(Error, Debug)]
pub enum Error {
    /// The data source identifier is not present in the registry
    #[error("Unknown data source: {0}")]
    UnknownSource(String),

    /// The call needs a bearer token and none was supplied
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// The provider rejected the supplied token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// An authorized-only operation was invoked on a public data source
    #[error("Capability mismatch: {0}")]
    CapabilityMismatch(String),

    /// The external provider answered with a failure or an unusable body
    #[error("{provider} error{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    ExternalProvider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// The provider does not know the requested project
    #[error("Project {id} not found in data source {data_source}")]
    ProjectNotFound { data_source: String, id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for dex-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an unknown data source error
    pub fn unknown_source(guid: impl Into<String>) -> Self {
        Error::UnknownSource(guid.into())
    }

    /// Create an authentication required error
    pub fn auth_required(msg: impl Into<String>) -> Self {
        Error::AuthenticationRequired(msg.into())
    }

    /// Create an authentication failed error
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Error::AuthenticationFailed(msg.into())
    }

    /// Create a capability mismatch error
    pub fn capability(msg: impl Into<String>) -> Self {
        Error::CapabilityMismatch(msg.into())
    }

    /// Create an external provider error
    pub fn provider(provider: impl Into<String>, status: Option<u16>, msg: impl Into<String>) -> Self {
        Error::ExternalProvider {
            provider: provider.into(),
            status,
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether the failure originated at the external provider (transport,
    /// non-success response, rejected code)
    pub fn is_external(&self) -> bool {
        matches!(self, Error::ExternalProvider { .. } | Error::Http(_))
    }
}
