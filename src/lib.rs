use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AskdocError>;

/// Failure kinds surfaced by the retrieval engine.
///
/// Variants stay distinct so the caller can map each to an appropriate
/// user-facing response: `RateLimited` carries retry-after data, `NotFound`
/// means the document must be re-ingested.
#[derive(Error, Debug)]
pub enum AskdocError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Vector index is not initialized")]
    NotInitialized,

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, retry after {reset_at}")]
    RateLimited {
        remaining: u32,
        reset_at: DateTime<Utc>,
    },

    #[error("Upstream provider error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod extract;
pub mod gemini;
pub mod rate_limit;
pub mod retrieval;
pub mod vector_store;
