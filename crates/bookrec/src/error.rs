//! Error types for the recommendation engine

use crate::artifacts::ArtifactName;

pub type Result<T> = std::result::Result<T, RecommendError>;

/// Failure signal surfaced to callers of every recommendation operation.
///
/// "Nothing to recommend" is never an error: operations return an empty
/// list for that case.
#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    /// A user/book/publisher value is outside a fixed encoder vocabulary.
    #[error("Unknown category '{value}' for encoder {encoder}")]
    UnknownCategory { encoder: ArtifactName, value: String },

    #[error("Vectorization failed: {0}")]
    Vectorization(String),

    /// An artifact required by the operation failed to load at startup.
    #[error("Artifact unavailable: {0}")]
    ArtifactUnavailable(ArtifactName),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecommendError {
    pub fn unknown(encoder: ArtifactName, value: impl Into<String>) -> Self {
        Self::UnknownCategory {
            encoder,
            value: value.into(),
        }
    }

    pub fn config(message: impl Into<String>, key: &str) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// True when the request itself was at fault (bad id, bad input).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownCategory { .. })
    }

    /// Message safe to hand back to an end user.
    pub fn public_message(&self) -> String {
        match self {
            Self::UnknownCategory { .. } => self.to_string(),
            Self::Vectorization(_) | Self::ArtifactUnavailable(_) => {
                "Recommendation model is not available".to_string()
            }
            Self::Repository(_) | Self::Configuration { .. } | Self::Internal(_) => {
                "Failed to generate recommendations".to_string()
            }
        }
    }
}

impl From<sqlx::Error> for RecommendError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RecommendError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {}", err))
    }
}

/// Why a single artifact could not be loaded. Logged at startup, never
/// returned from a recommendation call.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] bincode::Error),

    #[error("Invalid artifact: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_is_client_error() {
        let err = RecommendError::unknown(ArtifactName::UserIdEncoder, "ghost");
        assert!(err.is_client_error());
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_internal_error_message_is_opaque() {
        let err = RecommendError::Internal("row 17 of matrix had NaN".to_string());
        assert!(!err.is_client_error());
        assert!(!err.public_message().contains("NaN"));
    }
}
