//! Article catalog seam
//!
//! A [`Catalog`] lists the articles published by one source, a page at a time.
//! The crate ships no production client: listing requires an authenticated
//! session the caller owns. [`collect_articles`] walks the pages.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One article listed by the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDescriptor {
    /// Catalog-assigned article id
    pub id: String,
    /// Article title (may carry search highlight markup)
    pub title: String,
    /// Article URL
    pub url: String,
    /// Identifier of the publishing source
    pub source_id: String,
    /// Raw item type code
    #[serde(default)]
    pub show_type: Option<i64>,
    /// Publish time, seconds since the epoch
    #[serde(default)]
    pub create_time: Option<i64>,
}

impl ArticleDescriptor {
    /// Item type of this article
    pub fn kind(&self) -> ShowType {
        self.show_type.map(ShowType::from_code).unwrap_or(ShowType::Unknown)
    }
}

/// Item type of a catalog entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowType {
    /// Regular article with text and images
    Article,
    /// Shared video
    VideoShare,
    /// Shared music
    MusicShare,
    /// Shared audio
    AudioShare,
    /// Image gallery
    ImageShare,
    /// Shared text
    TextShare,
    /// Forwarded article card
    ArticleShare,
    /// Short post
    ShortPost,
    /// Any other code
    Unknown,
}

impl ShowType {
    /// Map a raw item type code
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ShowType::Article,
            5 => ShowType::VideoShare,
            6 => ShowType::MusicShare,
            7 => ShowType::AudioShare,
            8 => ShowType::ImageShare,
            10 => ShowType::TextShare,
            11 => ShowType::ArticleShare,
            17 => ShowType::ShortPost,
            _ => ShowType::Unknown,
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            ShowType::Article => "普通图文",
            ShowType::VideoShare => "视频分享",
            ShowType::MusicShare => "音乐分享",
            ShowType::AudioShare => "音频分享",
            ShowType::ImageShare => "图片分享",
            ShowType::TextShare => "文本分享",
            ShowType::ArticleShare => "文章分享",
            ShowType::ShortPost => "短文",
            ShowType::Unknown => "未识别",
        }
    }
}

impl fmt::Display for ShowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One page of catalog results
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogPage {
    /// Articles on this page
    pub articles: Vec<ArticleDescriptor>,
    /// Whether another page follows
    pub has_more: bool,
}

/// Paginated listing of a source's articles
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List page `page` (0-based) of the articles published by `source_id`
    async fn list_articles(&self, source_id: &str, page: usize) -> Result<CatalogPage>;
}

/// Collect descriptors page by page until the catalog reports no more pages or
/// `max_pages` pages were read.
///
/// Articles already seen (same id) are dropped. A failing page is returned as an
/// error; nothing collected so far is kept.
pub async fn collect_articles(
    catalog: &dyn Catalog,
    source_id: &str,
    max_pages: Option<usize>,
) -> Result<Vec<ArticleDescriptor>> {
    let mut articles: Vec<ArticleDescriptor> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut page = 0;

    loop {
        if max_pages.is_some_and(|max| page >= max) {
            break;
        }
        let listing = catalog
            .list_articles(source_id, page)
            .await
            .map_err(|e| match e {
                Error::Catalog(message) => Error::Catalog(message),
                other => Error::Catalog(format!("page {page} of {source_id}: {other}")),
            })?;

        let before = articles.len();
        for article in listing.articles {
            if seen.insert(article.id.clone()) {
                articles.push(article);
            }
        }
        tracing::debug!(
            source_id,
            page,
            added = articles.len() - before,
            total = articles.len(),
            "catalog page collected"
        );

        page += 1;
        if !listing.has_more {
            break;
        }
    }

    tracing::info!(source_id, pages = page, articles = articles.len(), "catalog collected");
    Ok(articles)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn descriptor(id: &str) -> ArticleDescriptor {
        ArticleDescriptor {
            id: id.to_string(),
            title: format!("title {id}"),
            url: format!("https://mp.example/s/{id}"),
            source_id: "src".to_string(),
            show_type: Some(0),
            create_time: None,
        }
    }

    struct PagedCatalog {
        pages: Vec<Vec<&'static str>>,
        requested: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Catalog for PagedCatalog {
        async fn list_articles(&self, _source_id: &str, page: usize) -> Result<CatalogPage> {
            self.requested.lock().unwrap().push(page);
            let ids = self
                .pages
                .get(page)
                .ok_or_else(|| Error::Catalog("no such page".to_string()))?;
            Ok(CatalogPage {
                articles: ids.iter().map(|id| descriptor(id)).collect(),
                has_more: page + 1 < self.pages.len(),
            })
        }
    }

    #[test]
    fn show_type_codes() {
        assert_eq!(ShowType::from_code(0).label(), "普通图文");
        assert_eq!(ShowType::from_code(8), ShowType::ImageShare);
        assert_eq!(ShowType::from_code(17).to_string(), "短文");
        assert_eq!(ShowType::from_code(3), ShowType::Unknown);
        assert_eq!(ShowType::Unknown.label(), "未识别");

        let mut d = descriptor("1");
        d.show_type = None;
        assert_eq!(d.kind(), ShowType::Unknown);
    }

    #[tokio::test]
    async fn collects_until_last_page() {
        let catalog = PagedCatalog {
            pages: vec![vec!["a", "b"], vec!["b", "c"], vec!["d"]],
            requested: Mutex::new(Vec::new()),
        };
        let articles = collect_articles(&catalog, "src", None).await.unwrap();
        let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(*catalog.requested.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn stops_at_page_limit() {
        let catalog = PagedCatalog {
            pages: vec![vec!["a"], vec!["b"], vec!["c"]],
            requested: Mutex::new(Vec::new()),
        };
        let articles = collect_articles(&catalog, "src", Some(2)).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(*catalog.requested.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn failing_page_is_a_catalog_error() {
        struct Broken;
        #[async_trait]
        impl Catalog for Broken {
            async fn list_articles(&self, _: &str, _: usize) -> Result<CatalogPage> {
                Err(Error::Other("boom".to_string()))
            }
        }
        let err = collect_articles(&Broken, "src", None).await.unwrap_err();
        assert!(matches!(err, Error::Catalog(ref m) if m.contains("boom")));
    }
}
