//! Provider errors, classified for the chunk retry loop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ChatError {
    /// HTTP 429, or a body that says so.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ChatError::RateLimited(_))
    }

    /// Worth retrying the same chunk.
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::RateLimited(_) | ChatError::Timeout | ChatError::Http(_) => true,
            ChatError::Api { status, .. } => *status >= 500,
            ChatError::InvalidResponse(_) | ChatError::NotConfigured(_) => false,
        }
    }
}

/// Some gateways report throttling with a non-429 status.
pub(crate) fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("too many requests")
}

impl From<ChatError> for casefile_core::Error {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::NotConfigured(msg) => casefile_core::Error::Config(msg),
            other => casefile_core::Error::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ChatError::RateLimited("slow down".into()).is_rate_limit());
        assert!(ChatError::Timeout.is_transient());
        assert!(ChatError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!ChatError::Api { status: 401, body: String::new() }.is_transient());
        assert!(!ChatError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn test_rate_limit_message() {
        assert!(mentions_rate_limit("Rate limit reached for gpt-4o-mini"));
        assert!(mentions_rate_limit(r#"{"error":{"code":"rate_limit_exceeded"}}"#));
        assert!(!mentions_rate_limit("invalid api key"));
    }
}
