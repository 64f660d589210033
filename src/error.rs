//! Error types for the vector database

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for VectorDB operations
pub type Result<T> = std::result::Result<T, VectorDbError>;

/// The kind of entity a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Library,
    Document,
    Chunk,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Library => "Library",
            EntityKind::Document => "Document",
            EntityKind::Chunk => "Chunk",
        };
        f.write_str(name)
    }
}

/// Error types that can occur in VectorDB operations
#[derive(Error, Debug)]
pub enum VectorDbError {
    /// The id never existed, was deleted, or belongs to a different parent.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A workflow spanning several store calls stopped part-way through.
    /// Every step before `completed` took effect.
    #[error("Operation failed after {completed} of {total} steps: {source}")]
    PartialFailure {
        completed: usize,
        total: usize,
        #[source]
        source: Box<VectorDbError>,
    },
}

impl VectorDbError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        VectorDbError::NotFound { kind, id }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        VectorDbError::InvalidArgument(reason.into())
    }

    /// True for missing entities, including the cause of a partial failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            VectorDbError::NotFound { .. } => true,
            VectorDbError::PartialFailure { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// True for caller mistakes: bad `k`, empty or mismatched embeddings,
    /// unknown selectors.
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            VectorDbError::DimensionMismatch { .. } | VectorDbError::InvalidArgument(_) => true,
            VectorDbError::PartialFailure { source, .. } => source.is_invalid_argument(),
            _ => false,
        }
    }

    /// Only interrupted workflows are worth retrying; single store calls
    /// are atomic and fail the same way twice.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VectorDbError::PartialFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let id = Uuid::nil();
        let err = VectorDbError::not_found(EntityKind::Document, id);
        assert_eq!(
            err.to_string(),
            "Document not found: 00000000-0000-0000-0000-000000000000"
        );
        assert!(err.is_not_found());
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn test_partial_failure_classification() {
        let err = VectorDbError::PartialFailure {
            completed: 2,
            total: 5,
            source: Box::new(VectorDbError::not_found(EntityKind::Chunk, Uuid::nil())),
        };
        assert!(err.is_retryable());
        assert!(err.is_not_found());
        assert!(!VectorDbError::invalid("k must be positive").is_retryable());
    }
}
