use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by a [`TextProvider`](crate::provider::TextProvider).
///
/// The `Display` text is what a failed item carries as its error message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limit (429): quota exceeded, increase delay or reduce concurrency. {0}")]
    RateLimited(String),

    #[error("Auth error: API key invalid or unauthorized for this model. {0}")]
    Auth(String),

    #[error("Bad request (400): invalid input or model configuration. {0}")]
    BadRequest(String),

    #[error("Server error: provider service is experiencing issues. {0}")]
    ProviderInternal(String),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Provider not initialized. Please check API key.")]
    NotInitialized,

    #[error("Cannot reach provider at {0}: {1}")]
    Connection(String, String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Classify a non-success HTTP status returned by a vendor API.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = truncate(body.trim(), 300);
        match status {
            429 => ProviderError::RateLimited(detail),
            401 | 403 => ProviderError::Auth(detail),
            400 => ProviderError::BadRequest(detail),
            500..=599 => ProviderError::ProviderInternal(detail),
            _ => ProviderError::Other(format!("Provider returned HTTP {}: {}", status, detail)),
        }
    }

    /// Transient kinds where requeueing later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_)
                | ProviderError::ProviderInternal(_)
                | ProviderError::Timeout(_)
                | ProviderError::Connection(..)
        )
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Errors loading or validating a [`PipelineConfig`](crate::config::PipelineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Errors raised while ingesting a JSON dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("JSON syntax error: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("No text content found in the dataset")]
    NoTextContent,
}

/// Errors surfaced by the engine's control surface.
///
/// Per-item provider failures never show up here; they are recorded on the
/// item itself.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Provider not initialized. Please check API key.")]
    NotInitialized,

    #[error("Could not validate provider credentials for model '{model}'")]
    ValidationFailed { model: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ProviderError::from_status(429, "slow down"),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, "PERMISSION_DENIED"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::from_status(401, ""),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::from_status(400, "INVALID_ARGUMENT"),
            ProviderError::BadRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_status(503, "INTERNAL"),
            ProviderError::ProviderInternal(_)
        ));
        match ProviderError::from_status(404, "no such model") {
            ProviderError::Other(msg) => assert!(msg.contains("404")),
            other => panic!("Expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_message() {
        let err = ProviderError::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Request timed out after 60000ms");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_auth_not_retryable() {
        assert!(!ProviderError::Auth(String::new()).is_retryable());
        assert!(!ProviderError::BadRequest(String::new()).is_retryable());
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(1000);
        match ProviderError::from_status(500, &body) {
            ProviderError::ProviderInternal(detail) => {
                assert_eq!(detail.len(), 303);
                assert!(detail.ends_with("..."));
            }
            other => panic!("Expected ProviderInternal, got {:?}", other),
        }
    }

    #[test]
    fn test_messages_do_not_claim_a_single_status() {
        let unauthorized = ProviderError::from_status(401, "bad key").to_string();
        assert!(unauthorized.starts_with("Auth error: "));
        assert!(!unauthorized.contains("403"));

        let unavailable = ProviderError::from_status(503, "overloaded").to_string();
        assert!(unavailable.starts_with("Server error: "));
        assert!(!unavailable.contains("500"));
    }
}
