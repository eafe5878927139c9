use super::test_helpers::{
    BLOCKED_PAGE, DELETED_PAGE, StaticFetcher, article_page, create_test_downloader, test_config,
};
use super::*;
use crate::archiver::{ASSETS_DIR, INDEX_FILE};
use crate::catalog::{ArticleDescriptor, Catalog, CatalogPage};
use crate::error::Error;
use async_trait::async_trait;
use std::sync::Mutex;

const ARTICLE_URL: &str = "https://mp.example/s/first";

fn descriptor(id: &str, url: &str) -> ArticleDescriptor {
    ArticleDescriptor {
        id: id.to_string(),
        title: format!("article {id}"),
        url: url.to_string(),
        source_id: "source".to_string(),
        show_type: Some(0),
        create_time: None,
    }
}

#[tokio::test]
async fn acquire_archives_under_sanitized_title() {
    let fetcher = StaticFetcher::new()
        .with_body(ARTICLE_URL, "text/html; charset=utf-8", article_page("<p>hi</p>"));
    let (downloader, fetcher, _tmp) = create_test_downloader(fetcher);

    let request = AcquireRequest::new(ARTICLE_URL, r#"<em class="highlight">Rust</em>: news/today"#);
    let outcome = downloader.acquire(&request).await.unwrap();

    let AcquireOutcome::Archived(report) = outcome else {
        panic!("expected an archive, got {outcome:?}");
    };
    let expected_dir = downloader.get_config().output.root.join("Rust_ news_today");
    assert_eq!(report.index, expected_dir.join(INDEX_FILE));
    assert!(report.index.exists());

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].credentialed);
    assert!(calls[0].relay.is_none());
}

#[tokio::test]
async fn existing_index_skips_without_network() {
    let (downloader, fetcher, _tmp) = create_test_downloader(StaticFetcher::new());
    let request = AcquireRequest {
        url: ARTICLE_URL.to_string(),
        title: "ignored".to_string(),
        dir: Some("kept".to_string()),
    };
    let dir = downloader.archive_dir(&request);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(INDEX_FILE), "old").unwrap();
    let mut events = downloader.subscribe();

    let outcome = downloader.acquire(&request).await.unwrap();

    assert!(matches!(outcome, AcquireOutcome::AlreadyArchived { dir: ref d } if *d == dir));
    assert!(fetcher.calls().is_empty());
    assert_eq!(std::fs::read_to_string(dir.join(INDEX_FILE)).unwrap(), "old");
    assert!(matches!(events.try_recv().unwrap(), Event::ArticleSkipped { .. }));
}

#[tokio::test]
async fn deleted_article_is_reported_not_retried() {
    let fetcher = StaticFetcher::new().with_body(ARTICLE_URL, "text/html", DELETED_PAGE);
    let (downloader, fetcher, _tmp) = create_test_downloader(fetcher);
    let mut events = downloader.subscribe();

    let request = AcquireRequest::new(ARTICLE_URL, "gone");
    let outcome = downloader.acquire(&request).await.unwrap();

    assert!(matches!(outcome, AcquireOutcome::Deleted));
    assert_eq!(fetcher.count(ARTICLE_URL), 1);
    assert!(!downloader.archive_dir(&request).join(INDEX_FILE).exists());
    assert!(matches!(events.try_recv().unwrap(), Event::ArticleDeleted { .. }));
}

#[tokio::test]
async fn unavailable_page_is_retried_until_readable() {
    let fetcher = StaticFetcher::new()
        .with_body(ARTICLE_URL, "text/html", BLOCKED_PAGE)
        .with_body(ARTICLE_URL, "text/html", BLOCKED_PAGE)
        .with_body(ARTICLE_URL, "text/html", article_page("<p>finally</p>"));
    let (downloader, fetcher, _tmp) = create_test_downloader(fetcher);

    let html = downloader.fetch_article_html(ARTICLE_URL, "t").await.unwrap();

    assert!(html.contains("finally"));
    assert_eq!(fetcher.count(ARTICLE_URL), 3);
}

#[tokio::test]
async fn persistently_unavailable_page_fails_after_retries() {
    let fetcher = StaticFetcher::new().with_body(ARTICLE_URL, "text/html", BLOCKED_PAGE);
    let (downloader, fetcher, _tmp) = create_test_downloader(fetcher);

    let err = downloader.fetch_article_html(ARTICLE_URL, "t").await.unwrap_err();

    assert!(matches!(err, Error::ArticleUnavailable { .. }));
    let max_attempts = downloader.get_config().retry.max_attempts as usize;
    assert_eq!(fetcher.count(ARTICLE_URL), max_attempts + 1);
}

#[tokio::test]
async fn article_fetches_rotate_through_relays() {
    let (mut config, _tmp) = test_config();
    config.fetch.relays = vec![
        "https://relay-a.example/fetch".to_string(),
        "https://relay-b.example/fetch".to_string(),
    ];
    let fetcher = std::sync::Arc::new(
        StaticFetcher::new().with_body(ARTICLE_URL, "text/html", article_page("<p>x</p>")),
    );
    let downloader = ArticleDownloader::with_fetcher(config, fetcher.clone()).unwrap();

    downloader.fetch_article_html(ARTICLE_URL, "t").await.unwrap();
    downloader.fetch_article_html(ARTICLE_URL, "t").await.unwrap();

    let relays: Vec<String> = fetcher
        .calls()
        .iter()
        .map(|call| call.relay.as_ref().unwrap().to_string())
        .collect();
    assert_eq!(relays.len(), 2);
    assert_ne!(relays[0], relays[1]);
}

#[tokio::test]
async fn invalid_relay_rejects_construction() {
    let (mut config, _tmp) = test_config();
    config.fetch.relays = vec!["not a url".to_string()];
    let result = ArticleDownloader::with_fetcher(config, std::sync::Arc::new(StaticFetcher::new()));
    assert!(result.is_err());
}

#[tokio::test]
async fn acquire_all_continues_after_failure() {
    let fetcher = StaticFetcher::new()
        .with_body("https://mp.example/s/1", "text/html", article_page("<p>1</p>"))
        .with_status("https://mp.example/s/2", 404)
        .with_body("https://mp.example/s/3", "text/html", DELETED_PAGE)
        .with_body("https://mp.example/s/4", "text/html", article_page("<p>4</p>"));
    let (downloader, _fetcher, _tmp) = create_test_downloader(fetcher);
    let mut events = downloader.subscribe();

    let requests: Vec<AcquireRequest> = (1..=4)
        .map(|i| AcquireRequest::new(format!("https://mp.example/s/{i}"), format!("article {i}")))
        .collect();
    let summary = downloader.acquire_all(&requests).await;

    assert_eq!(
        summary,
        AcquireSummary {
            archived: 2,
            already_archived: 0,
            deleted: 1,
            failed: 1,
        }
    );
    let mut failed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::ArticleFailed { url, .. } = event {
            failed.push(url);
        }
    }
    assert_eq!(failed, vec!["https://mp.example/s/2".to_string()]);

    // A second run finds both archives and fetches nothing new
    let again = downloader.acquire_all(&requests).await;
    assert_eq!(again.already_archived, 2);
}

#[tokio::test]
async fn batch_fetch_drops_unreadable_articles() {
    let fetcher = StaticFetcher::new()
        .with_body("https://mp.example/s/a", "text/html", article_page("<p>a</p>"))
        .with_body("https://mp.example/s/b", "text/html", DELETED_PAGE)
        .with_body("https://mp.example/s/c", "text/html", article_page("<p>c</p>"));
    let (downloader, _fetcher, _tmp) = create_test_downloader(fetcher);
    let progress = Mutex::new(Vec::new());

    let articles = vec![
        descriptor("a", "https://mp.example/s/a"),
        descriptor("b", "https://mp.example/s/b"),
        descriptor("c", "https://mp.example/s/c"),
    ];
    let fetched = downloader
        .fetch_article_htmls(articles, |count| progress.lock().unwrap().push(count))
        .await;

    let ids: Vec<&str> = fetched.iter().map(|(a, _)| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert!(fetched[1].1.contains("<p>c</p>"));
    let mut progress = progress.into_inner().unwrap();
    progress.sort();
    assert_eq!(progress, vec![1, 2]);
}

struct OnePageCatalog;

#[async_trait]
impl Catalog for OnePageCatalog {
    async fn list_articles(&self, source_id: &str, page: usize) -> crate::Result<CatalogPage> {
        assert_eq!(source_id, "source");
        assert_eq!(page, 0);
        Ok(CatalogPage {
            articles: vec![
                descriptor("x", "https://mp.example/s/x"),
                descriptor("y", "https://mp.example/s/y"),
            ],
            has_more: false,
        })
    }
}

#[tokio::test]
async fn acquire_source_walks_the_catalog() {
    let fetcher = StaticFetcher::new()
        .with_body("https://mp.example/s/x", "text/html", article_page("<p>x</p>"))
        .with_body("https://mp.example/s/y", "text/html", article_page("<p>y</p>"));
    let (downloader, _fetcher, _tmp) = create_test_downloader(fetcher);

    let summary = downloader
        .acquire_source(&OnePageCatalog, "source", None)
        .await
        .unwrap();

    assert_eq!(summary.archived, 2);
    let root = downloader.get_config().output.root.clone();
    assert!(root.join("article x").join(INDEX_FILE).exists());
    assert!(root.join("article y").join(INDEX_FILE).exists());
}

#[tokio::test]
async fn archived_images_are_recompressed() {
    let mut png = std::io::Cursor::new(Vec::new());
    image::RgbImage::from_pixel(1500, 300, image::Rgb([10, 20, 30]))
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let (mut config, _tmp) = test_config();
    config.compression.enabled = true;
    let fetcher = std::sync::Arc::new(
        StaticFetcher::new()
            .with_body(
                ARTICLE_URL,
                "text/html",
                article_page(r#"<img src="https://img.example/wide.png">"#),
            )
            .with_body("https://img.example/wide.png", "image/png", png.into_inner()),
    );
    let downloader = ArticleDownloader::with_fetcher(config, fetcher).unwrap();

    let request = AcquireRequest::new(ARTICLE_URL, "wide");
    let AcquireOutcome::Archived(report) = downloader.acquire(&request).await.unwrap() else {
        panic!("expected an archive");
    };
    assert_eq!(report.saved(), 1);

    let assets = downloader.archive_dir(&request).join(ASSETS_DIR);
    let file = std::fs::read_dir(&assets).unwrap().next().unwrap().unwrap().path();
    let image = image::open(file).unwrap();
    assert_eq!(image::GenericImageView::dimensions(&image), (1000, 200));
}
