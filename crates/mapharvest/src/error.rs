//! Error types for resource-scoped failures.
//!
//! Everything here is recoverable: the orchestrator logs the error, skips the
//! resource (or the single source file) and moves on. Fatal conditions such as
//! a browser that refuses to launch are reported through `anyhow` instead.

use std::path::PathBuf;

/// All errors that can occur while harvesting a single resource.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("Invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed inline source map: {0}")]
    InlineMap(String),

    #[error("Source map decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Observation error: {0}")]
    Observation(String),
}

/// Convenience alias used throughout the library.
pub type HarvestResult<T> = Result<T, HarvestError>;

impl HarvestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
