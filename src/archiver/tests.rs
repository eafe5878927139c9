use super::*;
use crate::downloader::test_helpers::{DELETED_PAGE, StaticFetcher, article_page, create_test_downloader};
use crate::types::{AssetKind, AssetOutcome};
use std::collections::HashSet;
use std::time::Duration;

fn source(html: String) -> ArchiveSource {
    ArchiveSource {
        url: "https://mp.example/s/article".to_string(),
        title: "An <archived> article".to_string(),
        html,
    }
}

fn asset_files(out: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(out.join(ASSETS_DIR))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn one_failed_image_keeps_its_origin_url() {
    let mut fetcher = StaticFetcher::new();
    let mut content = String::new();
    for i in 1..=5 {
        let url = format!("https://img.example/{i}.png");
        content.push_str(&format!(r#"<p><img src="{url}"></p>"#));
        fetcher = if i == 3 {
            fetcher.with_status(&url, 500)
        } else {
            fetcher.with_body(&url, "image/png", format!("png {i}"))
        };
    }
    let (downloader, _fetcher, tmp) = create_test_downloader(fetcher);
    let out = tmp.path().join("article");

    let report = downloader
        .archiver
        .archive(&source(article_page(&content)), &out)
        .await
        .unwrap();

    assert_eq!(report.assets.len(), 5);
    assert_eq!(report.saved(), 4);
    assert_eq!(report.skipped(), 1);
    let failed = report.assets.iter().find(|r| !r.is_saved()).unwrap();
    assert_eq!(failed.url, "https://img.example/3.png");
    assert!(matches!(&failed.outcome, AssetOutcome::Skipped { reason } if reason.contains("500")));

    let index = std::fs::read_to_string(&report.index).unwrap();
    assert!(index.contains(r#"src="https://img.example/3.png""#));
    for i in [1, 2, 4, 5] {
        assert!(!index.contains(&format!(r#"src="https://img.example/{i}.png""#)));
    }
    assert_eq!(index.matches(r#"src="./assets/"#).count(), 4);
    assert_eq!(asset_files(&out).len(), 4);
}

#[tokio::test]
async fn generated_file_names_are_unique() {
    let mut fetcher = StaticFetcher::new();
    let mut content = String::new();
    for i in 0..20 {
        let url = format!("https://img.example/{i}.jpg");
        content.push_str(&format!(r#"<img src="{url}">"#));
        fetcher = fetcher.with_body(&url, "image/jpeg", "same bytes");
    }
    let (downloader, _fetcher, tmp) = create_test_downloader(fetcher);
    let out = tmp.path().join("article");

    let report = downloader
        .archiver
        .archive(&source(article_page(&content)), &out)
        .await
        .unwrap();

    let paths: HashSet<String> = report
        .assets
        .iter()
        .filter_map(|r| match &r.outcome {
            AssetOutcome::Saved { path } => Some(path.clone()),
            AssetOutcome::Skipped { .. } => None,
        })
        .collect();
    assert_eq!(paths.len(), 20);
    let files = asset_files(&out);
    assert_eq!(files.len(), 20);
    assert!(files.iter().all(|name| name.ends_with(".jpg")));
}

#[tokio::test]
async fn batches_run_in_category_order() {
    let content = r#"
        <img src="https://img.example/inline.png">
        <mp-common-mpaudio cover="https://img.example/cover.jpg" voice_encode_fileid="VOICE"></mp-common-mpaudio>
        <section style="background-image: url(https://img.example/bg.png);"></section>
        <iframe class="video_iframe" data-mpvid="wxv_1"></iframe>
        <script>var videoPageInfos = [{ video_id: 'wxv_1', is_mp_video: 1, cover_url: 'https://img.example/poster.jpg', mp_video_trans_info: [{url: 'https://v.example/1.mp4', filesize: 10}] }];</script>
    "#;
    let fetcher = StaticFetcher::new()
        .with_delay(Duration::from_millis(5))
        .with_body("https://img.example/inline.png", "image/png", "a")
        .with_body("https://img.example/cover.jpg", "image/jpeg", "b")
        .with_body(
            "https://res.wx.qq.com/voice/getvoice?mediaid=VOICE",
            "audio/mpeg",
            "c",
        )
        .with_body("https://img.example/bg.png", "image/png", "d")
        .with_body("https://img.example/poster.jpg", "image/jpeg", "e")
        .with_body("https://v.example/1.mp4", "video/mp4", "f");
    let (downloader, fetcher, tmp) = create_test_downloader(fetcher);

    let report = downloader
        .archiver
        .archive(&source(article_page(content)), &tmp.path().join("article"))
        .await
        .unwrap();

    assert_eq!(report.saved(), 6);
    let kinds: Vec<AssetKind> = report.assets.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AssetKind::Background,
            AssetKind::Image,
            AssetKind::Card,
            AssetKind::Audio,
            AssetKind::Card,
            AssetKind::Video,
        ]
    );

    let urls = fetcher.urls();
    let position = |url: &str| urls.iter().position(|u| u == url).unwrap();
    assert!(position("https://img.example/bg.png") < position("https://img.example/inline.png"));
    assert!(position("https://img.example/inline.png") < position("https://img.example/cover.jpg"));
    assert!(
        position("https://res.wx.qq.com/voice/getvoice?mediaid=VOICE")
            < position("https://img.example/poster.jpg")
    );
    assert!(fetcher.calls().iter().all(|call| !call.credentialed));

    let index = std::fs::read_to_string(&report.index).unwrap();
    assert!(index.contains(r#"cover="./assets/"#));
    assert!(index.contains(r#"poster="./assets/"#));
    assert!(!index.contains("video_iframe"));
    assert!(index.contains(".mp4\""));
}

#[tokio::test]
async fn repeated_background_is_fetched_once() {
    let content = r#"
        <section style="background-image: url(https://img.example/bg.png);"></section>
        <section style="background: url(&quot;https://img.example/bg.png&quot;) repeat;"></section>
        <style>.card { background-image: url('https://img.example/bg.png'); }</style>
    "#;
    let fetcher = StaticFetcher::new().with_body("https://img.example/bg.png", "image/png", "bg");
    let (downloader, fetcher, tmp) = create_test_downloader(fetcher);

    let report = downloader
        .archiver
        .archive(&source(article_page(content)), &tmp.path().join("article"))
        .await
        .unwrap();

    assert_eq!(fetcher.count("https://img.example/bg.png"), 1);
    assert_eq!(report.assets.len(), 1);
    let AssetOutcome::Saved { path } = &report.assets[0].outcome else {
        panic!("background should be saved");
    };
    let index = std::fs::read_to_string(&report.index).unwrap();
    assert!(!index.contains("https://img.example/bg.png"));
    assert_eq!(index.matches(path.as_str()).count(), 3);
}

#[tokio::test]
async fn same_url_in_two_phases_gets_two_files() {
    let content = r#"
        <section style="background-image: url(https://img.example/shared.png);"></section>
        <img src="https://img.example/shared.png">
    "#;
    let fetcher = StaticFetcher::new().with_body("https://img.example/shared.png", "image/png", "px");
    let (downloader, fetcher, tmp) = create_test_downloader(fetcher);
    let out = tmp.path().join("article");

    let report = downloader
        .archiver
        .archive(&source(article_page(content)), &out)
        .await
        .unwrap();

    assert_eq!(fetcher.count("https://img.example/shared.png"), 2);
    let kinds: Vec<AssetKind> = report.assets.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![AssetKind::Background, AssetKind::Image]);
    let paths: Vec<&str> = report
        .assets
        .iter()
        .filter_map(|r| match &r.outcome {
            AssetOutcome::Saved { path } => Some(path.as_str()),
            AssetOutcome::Skipped { .. } => None,
        })
        .collect();
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0], paths[1]);
    assert!(paths.iter().all(|p| p.starts_with("./assets/") && p.ends_with(".png")));

    let index = std::fs::read_to_string(&report.index).unwrap();
    assert!(!index.contains("https://img.example/shared.png"));
    assert_eq!(index.matches(paths[0]).count(), 1);
    assert!(index.contains(&format!(r#"src="{}""#, paths[1])));
    assert_eq!(asset_files(&out).len(), 2);
}

#[tokio::test]
async fn index_is_written_into_the_shell() {
    let (downloader, _fetcher, tmp) = create_test_downloader(StaticFetcher::new());
    let out = tmp.path().join("article");

    let report = downloader
        .archiver
        .archive(&source(article_page("<p>text only</p>")), &out)
        .await
        .unwrap();

    assert_eq!(report.index, out.join(INDEX_FILE));
    assert!(report.assets.is_empty());
    assert!(out.join(ASSETS_DIR).is_dir());

    let index = std::fs::read_to_string(&report.index).unwrap();
    assert!(index.contains("<title>An &lt;archived&gt; article</title>"));
    assert!(index.contains(r#"<body class="zh_CN wx_wap_page">"#));
    assert!(index.contains("2023年11月14日 22:13"));
    assert!(index.contains("text only"));
    assert!(index.contains(r#"<div id="js_content">"#));
    assert!(!index.contains("oriCreateTime"));
    assert!(index.contains("sns_opr_btn"));
}

#[tokio::test]
async fn deleted_page_writes_nothing() {
    let (downloader, _fetcher, tmp) = create_test_downloader(StaticFetcher::new());
    let out = tmp.path().join("article");

    let err = downloader
        .archiver
        .archive(&source(DELETED_PAGE.to_string()), &out)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ArticleDeleted { .. }));
    assert!(!out.join(INDEX_FILE).exists());
}

#[tokio::test]
async fn events_report_each_asset_and_batch() {
    let content = r#"<img src="https://img.example/ok.png"><img src="https://img.example/missing.png">"#;
    let fetcher = StaticFetcher::new().with_body("https://img.example/ok.png", "image/png", "ok");
    let (downloader, _fetcher, tmp) = create_test_downloader(fetcher);
    let mut events = downloader.subscribe();

    downloader
        .archiver
        .archive(&source(article_page(content)), &tmp.path().join("article"))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.iter().any(|e| matches!(e, Event::AssetSaved { url, .. } if url == "https://img.example/ok.png")));
    assert!(seen.iter().any(|e| matches!(e, Event::AssetSkipped { url, .. } if url == "https://img.example/missing.png")));
    assert!(seen.iter().any(|e| matches!(
        e,
        Event::BatchComplete { kind: AssetKind::Image, saved: 1, skipped: 1 }
    )));
    assert!(matches!(seen.last(), Some(Event::ArchiveWritten { saved: 1, skipped: 1, .. })));
}
