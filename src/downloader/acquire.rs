//! Acquiring articles: skip rule, fetch, archive, post-process.

use super::ArticleDownloader;
use crate::archiver::{ASSETS_DIR, ArchiveReport, ArchiveSource, INDEX_FILE};
use crate::catalog::{ArticleDescriptor, Catalog, collect_articles};
use crate::error::{Error, Result};
use crate::types::Event;
use crate::utils::{sanitize_dir_name, strip_highlight};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One article to acquire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireRequest {
    /// Article URL
    pub url: String,
    /// Title; search highlight markup is stripped
    pub title: String,
    /// Output directory name under `output.root`; derived from the title when `None`
    #[serde(default)]
    pub dir: Option<String>,
}

impl AcquireRequest {
    /// Request with a directory name derived from the title
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            dir: None,
        }
    }
}

impl From<&ArticleDescriptor> for AcquireRequest {
    fn from(article: &ArticleDescriptor) -> Self {
        Self::new(article.url.clone(), article.title.clone())
    }
}

/// How an acquisition ended
#[derive(Clone, Debug)]
pub enum AcquireOutcome {
    /// An index document already existed; nothing was fetched
    AlreadyArchived {
        /// Existing archive directory
        dir: PathBuf,
    },
    /// The article was archived
    Archived(ArchiveReport),
    /// The article was deleted by its author
    Deleted,
}

/// Counts over a multi-article run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireSummary {
    /// Articles archived in this run
    pub archived: usize,
    /// Articles skipped because an archive already existed
    pub already_archived: usize,
    /// Articles deleted by their author
    pub deleted: usize,
    /// Articles whose acquisition failed
    pub failed: usize,
}

impl ArticleDownloader {
    /// Archive directory for a request
    pub fn archive_dir(&self, request: &AcquireRequest) -> PathBuf {
        let name = match &request.dir {
            Some(dir) => dir.clone(),
            None => sanitize_dir_name(&strip_highlight(&request.title)),
        };
        self.config.output.root.join(name)
    }

    /// Acquire one article.
    ///
    /// If `<root>/<dir>/index.html` already exists the article is skipped without
    /// any network activity. Otherwise the page is fetched (with retry), archived,
    /// and its raster assets recompressed when enabled. Compression failures are
    /// logged only.
    pub async fn acquire(&self, request: &AcquireRequest) -> Result<AcquireOutcome> {
        let title = strip_highlight(&request.title);
        let dir = self.archive_dir(request);

        if tokio::fs::try_exists(dir.join(INDEX_FILE)).await? {
            tracing::info!(dir = %dir.display(), "archive exists, skipping");
            self.emit_event(Event::ArticleSkipped { dir: dir.clone() });
            return Ok(AcquireOutcome::AlreadyArchived { dir });
        }

        let html = match self.fetch_article_html(&request.url, &title).await {
            Ok(html) => html,
            Err(Error::ArticleDeleted { url }) => {
                tracing::info!(url = %url, title = %title, "article deleted by author, skipping");
                self.emit_event(Event::ArticleDeleted { url });
                return Ok(AcquireOutcome::Deleted);
            }
            Err(e) => return Err(e),
        };

        let source = ArchiveSource {
            url: request.url.clone(),
            title,
            html,
        };
        let report = self.archiver.archive(&source, &dir).await?;

        if self.config.compression.enabled {
            self.compressor.compress_dir(&dir.join(ASSETS_DIR)).await;
        }

        tracing::info!(dir = %dir.display(), "article archived");
        Ok(AcquireOutcome::Archived(report))
    }

    /// Acquire articles one after another.
    ///
    /// A failing article is logged and counted; the run continues with the next.
    /// After each archived article the run pauses for `fetch.article_pause`.
    pub async fn acquire_all(&self, requests: &[AcquireRequest]) -> AcquireSummary {
        let mut summary = AcquireSummary::default();
        let pause = self.config.fetch.article_pause;

        for (index, request) in requests.iter().enumerate() {
            match self.acquire(request).await {
                Ok(AcquireOutcome::AlreadyArchived { .. }) => summary.already_archived += 1,
                Ok(AcquireOutcome::Deleted) => summary.deleted += 1,
                Ok(AcquireOutcome::Archived(_)) => {
                    summary.archived += 1;
                    if !pause.is_zero() && index + 1 < requests.len() {
                        tokio::time::sleep(pause).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %request.url, title = %request.title, error = %e, "article acquisition failed");
                    self.emit_event(Event::ArticleFailed {
                        url: request.url.clone(),
                        error: e.to_string(),
                    });
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            archived = summary.archived,
            already_archived = summary.already_archived,
            deleted = summary.deleted,
            failed = summary.failed,
            "acquisition run finished"
        );
        summary
    }

    /// Collect every article a catalog lists for `source_id` and acquire them
    pub async fn acquire_source(
        &self,
        catalog: &dyn Catalog,
        source_id: &str,
        max_pages: Option<usize>,
    ) -> Result<AcquireSummary> {
        let articles = collect_articles(catalog, source_id, max_pages).await?;
        let requests: Vec<AcquireRequest> = articles.iter().map(AcquireRequest::from).collect();
        Ok(self.acquire_all(&requests).await)
    }
}
