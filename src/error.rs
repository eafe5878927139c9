//! Error types for article-dl
//!
//! This module provides error handling for the library, including:
//! - Fetch errors raised by the relay fetcher (status, timeout, transport)
//! - Document-shape errors (unavailable vs. deleted articles)
//! - Per-asset patch failures, which only ever fail the asset that raised them
//! - Narrow literal parser errors for embedded script statements

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for article-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for article-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.workers")
        key: Option<String>,
    },

    /// Network fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The article document carries no content container and no deletion marker.
    ///
    /// Usually a transient block page; the caller may retry.
    #[error("article unavailable: {url}")]
    ArticleUnavailable {
        /// URL of the article
        url: String,
    },

    /// The article was deleted by its author (terminal)
    #[error("article deleted: {url}")]
    ArticleDeleted {
        /// URL of the article
        url: String,
    },

    /// An embedded script value could not be parsed
    #[error("literal parse error: {0}")]
    Literal(#[from] LiteralError),

    /// The node an asset should be written back into no longer exists
    #[error("patch target not found for {kind} asset {url}")]
    PatchTargetNotFound {
        /// Asset category (image, background, ...)
        kind: String,
        /// Origin URL of the asset
        url: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image decode/encode error during recompression
    #[error("image error for {path}: {reason}")]
    Image {
        /// File being processed
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// Catalog listing failed
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised by a single relay fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL (or relay endpoint) could not be parsed
    #[error("invalid url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("{url} returned status {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The request did not complete within its timeout
    #[error("{url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL
        url: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Connection or protocol failure
    #[error("transport failure for {url}: {source}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// URL the failed request was issued for
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Transport { url, .. } => url,
        }
    }
}

/// Errors from the narrow literal parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    /// Input ended in the middle of a value
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd {
        /// Byte offset where input ran out
        offset: usize,
    },

    /// A character that cannot start or continue the expected construct
    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedChar {
        /// Character found
        found: char,
        /// Byte offset of the character
        offset: usize,
    },

    /// A construct outside the recognized literal subset (calls, operators, ...)
    #[error("unsupported expression at offset {offset}: {what}")]
    Unsupported {
        /// Short description of what was found
        what: String,
        /// Byte offset of the construct
        offset: usize,
    },
}
