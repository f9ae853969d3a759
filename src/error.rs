//! Error types for the Veracode API client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the library
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The API error behind this error, if any.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// API-related errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(
        "Error [401]: {body} for request {url}. Check that your Veracode API account credentials are correct."
    )]
    Unauthorized { body: String, url: String },

    #[error("Error [{status}]: {body} for request {url}")]
    Http {
        status: u16,
        body: String,
        url: String,
        conversation_id: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Embedded collection '{element}' missing from page {page}")]
    MissingElement { element: String, page: usize },
}

impl ApiError {
    /// HTTP status carried by this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// URL of the request that failed, if known.
    pub fn url(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { url, .. } | ApiError::Http { url, .. } => Some(url),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let target = err.url().map(|u| format!(" ({})", u)).unwrap_or_default();

        if err.is_builder() {
            ApiError::InvalidRequest(format!("{}{}", err, target))
        } else if err.is_timeout() {
            ApiError::Network(format!("Request timed out{}", target))
        } else if err.is_connect() {
            ApiError::Network(format!("Failed to connect to API{}", target))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(
        "Veracode API credentials not configured. Set VERACODE_API_KEY_ID and VERACODE_API_KEY_SECRET."
    )]
    MissingCredentials,

    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
