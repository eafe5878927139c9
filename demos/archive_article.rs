//! Archive a single article
//!
//! This example demonstrates the core functionality of article-dl:
//! - Building a configuration (optionally from a JSON file)
//! - Creating a downloader instance
//! - Subscribing to events
//! - Acquiring one article and printing the archive report
//!
//! ```bash
//! cargo run --example archive_article -- <url> <title> [config.json]
//! ```

use article_dl::{AcquireOutcome, AcquireRequest, ArticleDownloader, Config, Event};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "article_dl=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(url), Some(title)) = (args.next(), args.next()) else {
        eprintln!("usage: archive_article <url> <title> [config.json]");
        std::process::exit(2);
    };
    let mut config = match args.next() {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Ok(relay) = std::env::var("ARTICLE_RELAY") {
        config.fetch.relays.push(relay);
    }

    let downloader = ArticleDownloader::new(config)?;

    // Subscribe to events
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::ArticleFetched { url, bytes } => {
                    println!("✓ Fetched {url} ({bytes} bytes)");
                }
                Event::AssetSaved { kind, url, path } => {
                    println!("⬇ {kind:?} {url} -> {path}");
                }
                Event::AssetSkipped { kind, url, reason } => {
                    println!("✗ {kind:?} {url}: {reason}");
                }
                Event::BatchComplete {
                    kind,
                    saved,
                    skipped,
                } => {
                    println!("  {kind:?} batch: {saved} saved, {skipped} skipped");
                }
                Event::CompressionFailed { path, error } => {
                    println!("⚠ Could not recompress {}: {error}", path.display());
                }
                _ => {}
            }
        }
    });

    let request = AcquireRequest::new(url, title);
    match downloader.acquire(&request).await? {
        AcquireOutcome::Archived(report) => {
            println!(
                "✓ Archived {:?} article to {} ({} saved, {} kept remote, {} without a URL)",
                report.shape,
                report.index.display(),
                report.saved(),
                report.skipped(),
                report.missing
            );
        }
        AcquireOutcome::AlreadyArchived { dir } => {
            println!("Already archived in {}", dir.display());
        }
        AcquireOutcome::Deleted => {
            println!("The article was deleted by its author");
        }
    }

    Ok(())
}
