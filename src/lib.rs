//! # article-dl
//!
//! Offline archiver for web articles.
//!
//! ## Design Philosophy
//!
//! article-dl is designed to be:
//! - **Self-contained output** - Every image, background, audio and video asset an
//!   article references is saved next to its `index.html` and all references are
//!   rewritten to local paths
//! - **Partial-failure tolerant** - A failed asset keeps its origin URL; it never
//!   aborts the archive
//! - **Relay-aware** - Fetches can be routed through a small rotation of relay
//!   endpoints, with concurrent tasks never sharing a relay
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use article_dl::{AcquireRequest, ArticleDownloader, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.fetch.relays = vec!["https://relay.example.com/fetch".to_string()];
//!
//!     let downloader = ArticleDownloader::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = AcquireRequest::new("https://mp.weixin.qq.com/s/example", "Example");
//!     downloader.acquire(&request).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive writer: category batches, patching, document shell
pub mod archiver;
/// Article catalog seam and paginated collection
pub mod catalog;
/// Configuration types
pub mod config;
/// Downloader facade (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Article extraction: statements, layout variants, asset planning
pub mod extraction;
/// Relay fetcher
pub mod fetcher;
/// Queryable, mutable markup tree
pub mod markup;
/// Bounded download pool with relay rotation
pub mod pool;
/// Raster recompression of archived assets
pub mod post_processing;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions for titles, URLs, entities and times
pub mod utils;

// Re-export commonly used types
pub use archiver::{ArchiveReport, ArchiveSource, Archiver};
pub use catalog::{ArticleDescriptor, Catalog, CatalogPage, ShowType, collect_articles};
pub use config::{
    CompressionConfig, Config, FetchConfig, OutputConfig, RenderingConfig, RetryConfig,
};
pub use downloader::{AcquireOutcome, AcquireRequest, AcquireSummary, ArticleDownloader};
pub use error::{Error, FetchError, LiteralError, Result};
pub use extraction::{ArticleDocument, AssetPlan, AssetReference, ExtractionContext, extract};
pub use fetcher::{FetchOptions, Fetched, Fetcher, HttpFetcher, Relay, RelayRequest};
pub use pool::{DownloadPool, RelayRotation};
pub use post_processing::{CompressionSummary, ImageCompressor};
pub use types::{ArticleShape, AssetKind, AssetOutcome, AssetRecord, Event};
