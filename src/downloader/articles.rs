//! Article page fetching.

use super::ArticleDownloader;
use crate::catalog::ArticleDescriptor;
use crate::error::Result;
use crate::extraction::shape::check_availability;
use crate::fetcher::{FetchOptions, Relay};
use crate::markup::Document;
use crate::retry::fetch_with_retry;
use crate::types::Event;
use std::sync::atomic::{AtomicUsize, Ordering};

impl ArticleDownloader {
    /// Fetch one article page (credentialed, article timeout) and check that it is readable
    async fn fetch_article_once(&self, url: &str, relay: Option<&Relay>) -> Result<String> {
        let options = FetchOptions {
            credentialed: true,
            timeout: self.config.fetch.article_timeout,
        };
        let fetched = self.fetcher.fetch(url, relay, options).await?;
        let html = fetched.text();
        check_availability(&Document::parse(&html), url)?;

        self.emit_event(Event::ArticleFetched {
            url: url.to_string(),
            bytes: html.len(),
        });
        Ok(html)
    }

    /// Fetch an article page through the next relay of the rotation.
    ///
    /// Unavailable pages and transient fetch errors are retried with exponential
    /// backoff; a deleted article fails immediately with `ArticleDeleted`.
    pub async fn fetch_article_html(&self, url: &str, title: &str) -> Result<String> {
        tracing::debug!(url, title, "fetching article");
        fetch_with_retry(&self.config.retry, || async move {
            let relay = self.pool.rotation().next_relay();
            self.fetch_article_once(url, relay.as_ref()).await
        })
        .await
    }

    /// Fetch many article pages through the pool.
    ///
    /// Each success calls `on_progress` with the number fetched so far, then
    /// pauses for `fetch.article_pause`. Deleted, unavailable and failed articles
    /// are dropped from the result; the rest keep their input order.
    pub async fn fetch_article_htmls<P>(
        &self,
        articles: Vec<ArticleDescriptor>,
        on_progress: P,
    ) -> Vec<(ArticleDescriptor, String)>
    where
        P: Fn(usize),
    {
        let fetched = AtomicUsize::new(0);
        let pause = self.config.fetch.article_pause;

        let results = self
            .pool
            .downloads("articles", articles.clone(), |article, relay| {
                let fetched = &fetched;
                let on_progress = &on_progress;
                async move {
                    let html = self.fetch_article_once(&article.url, relay.as_ref()).await?;
                    on_progress(fetched.fetch_add(1, Ordering::SeqCst) + 1);
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    Ok(html)
                }
            })
            .await;

        articles
            .into_iter()
            .zip(results)
            .filter_map(|(article, html)| html.map(|html| (article, html)))
            .collect()
    }
}
