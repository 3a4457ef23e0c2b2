//! Component-boundary error taxonomy.
//!
//! Errors raised inside a workflow step are caught at the step boundary
//! and recorded on the step; they only propagate past the orchestrator
//! when the failing step is a hard dependency of the final result.

use thiserror::Error;

/// Indexing failed. Retryable; chunks already written remain valid
/// (at-least-once semantics, no cross-chunk rollback).
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("embedding provider unreachable: {0}")]
    Provider(String),
    #[error("vector store write failed")]
    Storage(#[from] sqlx::Error),
}

/// Search failed. Not retried automatically; surfaced as a step error.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query embedding failed: {0}")]
    Embedding(String),
    #[error("vector store unreachable")]
    Storage(#[from] sqlx::Error),
}

/// Persisting a workflow execution failed. Logged and recorded on the
/// persist step; never masks the computed workflow result.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("record store unreachable")]
    Storage(#[from] sqlx::Error),
    #[error("encoding execution record failed")]
    Encode(#[from] serde_json::Error),
}
