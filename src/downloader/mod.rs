//! Downloader facade split into focused submodules.
//!
//! The `ArticleDownloader` struct and its methods are organized by concern:
//! - [`articles`] - Article page fetching with availability checks and retry
//! - [`acquire`] - Per-article acquisition: skip rule, archive, post-processing

mod acquire;
mod articles;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use acquire::{AcquireOutcome, AcquireRequest, AcquireSummary};

use crate::archiver::Archiver;
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{Fetcher, HttpFetcher, Relay};
use crate::pool::{DownloadPool, RelayRotation};
use crate::post_processing::ImageCompressor;
use crate::types::Event;
use std::sync::Arc;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Archive futures hold the parsed document, which is not `Send`; drive them
/// on the calling task (or a `LocalSet`) rather than `tokio::spawn`.
#[derive(Clone)]
pub struct ArticleDownloader {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing)
    pub(crate) config: Arc<Config>,
    /// Fetcher used for article pages and assets
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Bounded pool shared by article and asset batches
    pub(crate) pool: DownloadPool,
    /// Archive writer
    pub(crate) archiver: Archiver,
    /// Raster recompression run after each archive
    pub(crate) compressor: ImageCompressor,
}

impl ArticleDownloader {
    /// Create a downloader with the reqwest-backed fetcher
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        Self::with_fetcher(config, fetcher)
    }

    /// Create a downloader over a caller-supplied fetcher
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;

        let relays = config
            .fetch
            .relays
            .iter()
            .map(|endpoint| Relay::parse(endpoint))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::info!(
            relays = relays.len(),
            workers = config.fetch.workers,
            "downloader initialized"
        );

        let rotation = Arc::new(RelayRotation::new(relays));
        let pool = DownloadPool::new(rotation, config.fetch.workers);

        // Buffer of 1000 events per subscriber
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let config = Arc::new(config);
        let archiver = Archiver::new(
            fetcher.clone(),
            pool.clone(),
            config.clone(),
            event_tx.clone(),
        );
        let compressor = ImageCompressor::new(config.compression.clone(), event_tx.clone());

        Ok(Self {
            event_tx,
            config,
            fetcher,
            pool,
            archiver,
            compressor,
        })
    }

    /// Subscribe to downloader events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// If a subscriber falls behind by more than 1000 events it receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use article_dl::{ArticleDownloader, Config};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = ArticleDownloader::new(Config::default())?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "archive event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
