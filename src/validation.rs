//! Caller-input validation.
//!
//! Malformed requests are rejected here, before any strategy runner
//! executes. Everything downstream can assume a well-formed request.

use crate::constants::{
    MAX_BFS_DEPTH_LIMIT, MAX_OWNER_ID_LENGTH, MAX_QUERY_LENGTH, MAX_RESULT_LIMIT,
};
use crate::errors::{MemoryError, Result};
use crate::types::RecallRequest;

/// Validate owner id: non-empty, bounded, restricted character set.
pub fn validate_owner_id(owner_id: &str) -> Result<()> {
    if owner_id.is_empty() {
        return Err(MemoryError::InvalidOwnerId("owner_id cannot be empty".to_string()));
    }

    if owner_id.len() > MAX_OWNER_ID_LENGTH {
        return Err(MemoryError::InvalidOwnerId(format!(
            "owner_id too long: {} chars (max: {})",
            owner_id.len(),
            MAX_OWNER_ID_LENGTH
        )));
    }

    // Only allow alphanumeric, dash, underscore, at, dot
    if !owner_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.')
    {
        return Err(MemoryError::InvalidOwnerId(
            "owner_id contains invalid characters (allowed: alphanumeric, -, _, @, .)".to_string(),
        ));
    }

    Ok(())
}

/// Validate an embedding vector: non-empty and finite.
pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(MemoryError::InvalidEmbedding("embedding cannot be empty".to_string()));
    }

    if embedding.iter().any(|&v| !v.is_finite()) {
        return Err(MemoryError::InvalidEmbedding(
            "embedding contains NaN or Inf values".to_string(),
        ));
    }

    Ok(())
}

/// Validate a full recall request.
pub fn validate_recall_request(request: &RecallRequest) -> Result<()> {
    if request.query.trim().is_empty() {
        return Err(MemoryError::InvalidInput {
            field: "query".to_string(),
            reason: "query cannot be empty".to_string(),
        });
    }

    if request.query.len() > MAX_QUERY_LENGTH {
        return Err(MemoryError::InvalidInput {
            field: "query".to_string(),
            reason: format!(
                "query too long: {} chars (max: {})",
                request.query.len(),
                MAX_QUERY_LENGTH
            ),
        });
    }

    validate_owner_id(&request.owner_id)?;

    if let Some(min) = request.min_results {
        if min > MAX_RESULT_LIMIT {
            return Err(MemoryError::InvalidInput {
                field: "min_results".to_string(),
                reason: format!("min_results exceeds limit of {MAX_RESULT_LIMIT}"),
            });
        }
    }

    if let Some(threshold) = request.score_threshold {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(MemoryError::InvalidInput {
                field: "score_threshold".to_string(),
                reason: format!("score_threshold must be a non-negative number, got: {threshold}"),
            });
        }
    }

    if let Some(window) = &request.time_window {
        if window.start > window.end {
            return Err(MemoryError::InvalidInput {
                field: "time_window".to_string(),
                reason: "time_window start is after end".to_string(),
            });
        }
    }

    if let Some(embedding) = &request.query_embedding {
        validate_embedding(embedding)?;
    }

    Ok(())
}

/// Validate a caller-supplied BFS depth override.
pub fn validate_bfs_depth(depth: usize) -> Result<()> {
    if depth > MAX_BFS_DEPTH_LIMIT {
        return Err(MemoryError::InvalidInput {
            field: "max_bfs_depth".to_string(),
            reason: format!("max_bfs_depth {depth} exceeds limit of {MAX_BFS_DEPTH_LIMIT}"),
        });
    }
    Ok(())
}
