//! Structured error types for the memory core.
//!
//! The taxonomy mirrors the propagation policy: degraded sources and empty
//! fusions are absorbed inside the recall pipeline and never surface here;
//! what remains is caller-input rejection, store faults, and durable space
//! pipeline failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error payload for callers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error types raised by the memory core.
#[derive(Debug)]
pub enum MemoryError {
    // Caller-input errors - rejected before any runner executes
    InvalidInput { field: String, reason: String },
    InvalidOwnerId(String),
    InvalidEpisodeId(String),
    InvalidEmbedding(String),

    // Not found
    EpisodeNotFound(String),
    SpaceNotFound(String),
    StatementNotFound(String),

    // Space lifecycle
    InvalidTransition { from: String, to: String },
    ClusteringInProgress { owner: String },

    // Store faults
    StoreError(String),
    IndexError(String),
    SerializationError(String),

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl MemoryError {
    /// Stable error code for client identification.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::InvalidOwnerId(_) => "INVALID_OWNER_ID",
            Self::InvalidEpisodeId(_) => "INVALID_EPISODE_ID",
            Self::InvalidEmbedding(_) => "INVALID_EMBEDDING",
            Self::EpisodeNotFound(_) => "EPISODE_NOT_FOUND",
            Self::SpaceNotFound(_) => "SPACE_NOT_FOUND",
            Self::StatementNotFound(_) => "STATEMENT_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ClusteringInProgress { .. } => "CLUSTERING_IN_PROGRESS",
            Self::StoreError(_) => "STORE_ERROR",
            Self::IndexError(_) => "INDEX_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Detailed error message.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::InvalidOwnerId(msg) => format!("Invalid owner id: {msg}"),
            Self::InvalidEpisodeId(msg) => format!("Invalid episode id: {msg}"),
            Self::InvalidEmbedding(msg) => format!("Invalid embedding: {msg}"),
            Self::EpisodeNotFound(id) => format!("Episode not found: {id}"),
            Self::SpaceNotFound(id) => format!("Space not found: {id}"),
            Self::StatementNotFound(id) => format!("Statement not found: {id}"),
            Self::InvalidTransition { from, to } => {
                format!("Invalid space transition: {from} -> {to}")
            }
            Self::ClusteringInProgress { owner } => {
                format!("Clustering already running for owner '{owner}'")
            }
            Self::StoreError(msg) => format!("Store error: {msg}"),
            Self::IndexError(msg) => format!("Index error: {msg}"),
            Self::SerializationError(msg) => format!("Serialization error: {msg}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// True for errors caused by malformed caller input (taxonomy class d).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::InvalidOwnerId(_)
                | Self::InvalidEpisodeId(_)
                | Self::InvalidEmbedding(_)
        )
    }

    /// Convert to the structured response payload.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
            details: None,
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MemoryError {}

impl From<anyhow::Error> for MemoryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Type alias for Results using MemoryError.
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MemoryError::InvalidOwnerId("x".to_string()).code(),
            "INVALID_OWNER_ID"
        );
        assert_eq!(
            MemoryError::SpaceNotFound("123".to_string()).code(),
            "SPACE_NOT_FOUND"
        );
    }

    #[test]
    fn test_caller_error_classification() {
        assert!(MemoryError::InvalidInput {
            field: "query".to_string(),
            reason: "empty".to_string(),
        }
        .is_caller_error());
        assert!(!MemoryError::StoreError("io".to_string()).is_caller_error());
    }

    #[test]
    fn test_error_response_serialization() {
        let err = MemoryError::EpisodeNotFound("abc".to_string());
        let response = err.to_response();
        assert_eq!(response.code, "EPISODE_NOT_FOUND");
        assert!(response.message.contains("abc"));
    }
}
