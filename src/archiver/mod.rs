//! Offline archive writer
//!
//! Drives the download pool once per asset category, in the fixed order
//! background, images, audio, video, then writes the patched article into the
//! document shell as `index.html`. The parsed document is not `Send`, so an
//! archive runs entirely on the caller's task.

mod batches;
mod shell;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extraction::extract;
use crate::fetcher::Fetcher;
use crate::pool::DownloadPool;
use crate::types::{ArticleShape, AssetRecord, Event};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Subdirectory of an archive holding downloaded assets
pub const ASSETS_DIR: &str = "assets";
/// File name of the archived document
pub const INDEX_FILE: &str = "index.html";

/// Article page to archive
#[derive(Clone, Debug)]
pub struct ArchiveSource {
    /// Article URL (used in errors and events)
    pub url: String,
    /// Title rendered into the document shell
    pub title: String,
    /// Fetched page markup
    pub html: String,
}

/// Result of one archive run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveReport {
    /// Written index document
    pub index: PathBuf,
    /// Layout variant of the article
    pub shape: ArticleShape,
    /// Terminal state of every asset reference, in batch order
    pub assets: Vec<AssetRecord>,
    /// Optional values and assets that were absent from the page
    pub missing: usize,
}

impl ArchiveReport {
    /// Number of assets saved locally
    pub fn saved(&self) -> usize {
        self.assets.iter().filter(|r| r.is_saved()).count()
    }

    /// Number of assets that kept their origin URL
    pub fn skipped(&self) -> usize {
        self.assets.len() - self.saved()
    }
}

/// Archive writer (cloneable - all shared state is Arc-wrapped)
#[derive(Clone)]
pub struct Archiver {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) pool: DownloadPool,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl Archiver {
    /// Create an archiver sharing the given fetcher, pool and event channel
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        pool: DownloadPool,
        config: Arc<Config>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            fetcher,
            pool,
            config,
            event_tx,
        }
    }

    /// Archive `source` into `out_dir`.
    ///
    /// Asset failures are recorded in the report and leave the origin URL in the
    /// document. Errors are returned for extraction failures (unavailable or
    /// deleted page) and for directory or index writes; assets already written
    /// stay in place.
    pub async fn archive(&self, source: &ArchiveSource, out_dir: &Path) -> Result<ArchiveReport> {
        let utc_offset = self.config.rendering.publish_time_utc_offset_minutes;
        let (article, mut plan) = extract(&source.html, &source.url, utc_offset)?;

        let assets_dir = out_dir.join(ASSETS_DIR);
        tokio::fs::create_dir_all(&assets_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create assets directory '{}': {}",
                    assets_dir.display(),
                    e
                ),
            ))
        })?;

        tracing::info!(
            url = %source.url,
            shape = ?article.shape,
            assets = plan.len(),
            "archiving article"
        );

        let mut assets = Vec::with_capacity(plan.len());
        for batch in batches::BATCH_ORDER {
            let references = batches::take_batch(&mut plan, batch);
            let records = self.run_batch(batch, references, &plan, &assets_dir).await;
            assets.extend(records);
        }

        let html = shell::render(&article, &source.title, &self.config.rendering);
        let index = out_dir.join(INDEX_FILE);
        tokio::fs::write(&index, html).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write '{}': {}", index.display(), e),
            ))
        })?;

        let report = ArchiveReport {
            index,
            shape: article.shape,
            assets,
            missing: plan.missing,
        };
        tracing::info!(
            index = %report.index.display(),
            saved = report.saved(),
            skipped = report.skipped(),
            missing = report.missing,
            "archive written"
        );
        self.emit_event(Event::ArchiveWritten {
            index: report.index.clone(),
            saved: report.saved(),
            skipped: report.skipped(),
        });
        Ok(report)
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
