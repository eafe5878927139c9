//! Shared test helpers: a scripted fetcher and downloader construction.

use crate::config::Config;
use crate::downloader::ArticleDownloader;
use crate::error::FetchError;
use crate::fetcher::{FetchOptions, Fetched, Fetcher, Relay};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

/// Scripted response for one URL
#[derive(Clone, Debug)]
pub(crate) enum Scripted {
    Body {
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Status(u16),
}

/// One recorded fetch call
#[derive(Clone, Debug)]
pub(crate) struct FetchCall {
    pub(crate) url: String,
    pub(crate) relay: Option<Relay>,
    pub(crate) credentialed: bool,
}

/// In-memory [`Fetcher`] answering from a script; unknown URLs get a 404.
///
/// A URL with several scripted responses answers them in order and then keeps
/// repeating the last one.
#[derive(Default)]
pub(crate) struct StaticFetcher {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<FetchCall>>,
    delay: Option<Duration>,
}

impl StaticFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Delay every answer (lets concurrent tasks overlap)
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_body(self, url: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.push(
            url,
            Scripted::Body {
                content_type: Some(content_type.to_string()),
                body: body.into(),
            },
        );
        self
    }

    pub(crate) fn with_status(self, url: &str, status: u16) -> Self {
        self.push(url, Scripted::Status(status));
        self
    }

    fn push(&self, url: &str, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub(crate) fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    pub(crate) fn count(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.url == url).count()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(
        &self,
        url: &str,
        relay: Option<&Relay>,
        options: FetchOptions,
    ) -> Result<Fetched, FetchError> {
        self.calls.lock().unwrap().push(FetchCall {
            url: url.to_string(),
            relay: relay.cloned(),
            credentialed: options.credentialed,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match response {
            Some(Scripted::Body { content_type, body }) => Ok(Fetched { body, content_type }),
            Some(Scripted::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Config writing into a fresh temp dir, with fast retries and no pauses
pub(crate) fn test_config() -> (Config, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = Config::default();
    config.output.root = temp_dir.path().join("downloads");
    config.fetch.workers = 3;
    config.fetch.article_pause = Duration::ZERO;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config.compression.enabled = false;
    config.rendering.publish_time_utc_offset_minutes = Some(0);
    (config, temp_dir)
}

/// Downloader over a scripted fetcher.
/// Returns the downloader, the fetcher handle and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader(
    fetcher: StaticFetcher,
) -> (ArticleDownloader, Arc<StaticFetcher>, tempfile::TempDir) {
    let (config, temp_dir) = test_config();
    let fetcher = Arc::new(fetcher);
    let downloader = ArticleDownloader::with_fetcher(config, fetcher.clone()).unwrap();
    (downloader, fetcher, temp_dir)
}

/// Readable article page wrapping `content` in the usual containers
pub(crate) fn article_page(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>page</title></head>
<body class="zh_CN wx_wap_page">
<div id="js_article" class="rich_media">
  <h1 id="activity-name">Title</h1>
  <em id="publish_time"></em>
  <div id="js_content" style="visibility: hidden; opacity: 0;">{content}</div>
  <script>var oriCreateTime = '1700000000';</script>
</div>
<div id="js_article_bottom_bar"><span class="sns_opr_btn">like</span></div>
</body></html>"#
    )
}

/// Page served for an article deleted by its author
pub(crate) const DELETED_PAGE: &str =
    r#"<html><body><div id="js_fullscreen_layout_padding"></div><p>deleted</p></body></html>"#;

/// Page served while the platform rate-limits the client
pub(crate) const BLOCKED_PAGE: &str = r#"<html><body><p>verify you are human</p></body></html>"#;
