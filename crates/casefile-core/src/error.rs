//! Error types for Casefile.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate content: hash={0}")]
    DuplicateContent(String),

    #[error("Document key already taken: {0}")]
    DuplicateKey(String),

    #[error("Invalid job transition: {0}")]
    InvalidTransition(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a unique-key conflict that callers may treat
    /// as an idempotent no-op.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::DuplicateContent(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_collision_is_not_a_conflict() {
        assert!(Error::DuplicateContent("abc".into()).is_conflict());
        assert!(!Error::DuplicateKey("EFTA00001".into()).is_conflict());
    }
}
