//! Availability check, subtree cleanup and document-shape placeholders.

use super::ExtractionContext;
use crate::error::{Error, Result};
use crate::markup::{Document, Element};
use crate::types::ArticleShape;
use crate::utils::{decode_html_entities, escape_html};
use regex::Regex;
use std::sync::LazyLock;

/// Content container present in every readable article
const CONTENT_SELECTOR: &str = "#js_content";
/// Marker present on the "deleted by author" page
const DELETED_MARKER_SELECTOR: &str = "#js_fullscreen_layout_padding";

/// Nodes under the article root that never belong in an archive
const REMOVED_SELECTORS: &[&str] = &[
    "#js_top_ad_area",
    "#js_tags_preview_toast",
    "#content_bottom_area",
    "#js_pc_qr_code",
    "#wx_stream_article_slide_tip",
    "script",
];

/// Maximum characters of a forwarded card's digest before it is cut with `...`
const DIGEST_MAX_CHARS: usize = 140;
/// Gallery pictures rendered into an image share
const MAX_GALLERY_PICTURES: usize = 20;

const IMAGE_SHARE_CLASSES: &[&str] = &["pages_skin_pc", "page_share_img"];
const VIDEO_SHARE_CLASSES: &[&str] = &[
    "zh_CN",
    "wx_wap_page",
    "wx_wap_desktop_fontsize_2",
    "page_share_video",
    "white_video_page",
    "discuss_tab",
    "appmsg_skin_default",
    "appmsg_style_default",
    "pages_skin_pc",
];

const GALLERY_WRAPPER_STYLE: &str =
    "display: flex;flex-direction: column;align-items: center;gap: 10px;padding-block: 20px;";
const GALLERY_IMAGE_STYLE: &str =
    "display: block;border: 1px solid gray;border-radius: 5px;max-width: 90%;";

/// Embedded widgets replaced by bracket placeholders in a forwarded card's digest
#[allow(clippy::expect_used)]
static CARD_PLACEHOLDERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"<img[^>]*>", "[图片]"),
        (
            r#"(?i)<iframe [^>]*?class="res_iframe card_iframe js_editor_card"[^>]*?data-cardid=['"][^'"]*[^>]*?></iframe>"#,
            "[卡券]",
        ),
        (r"<mpvoice[^>]*?js_editor_audio[^>]*?></mpvoice>", "[语音]"),
        (r"<mpgongyi[^>]*?js_editor_gy[^>]*?></mpgongyi>", "[公益]"),
        (r"<qqmusic[^>]*?js_editor_qqmusic[^>]*?></qqmusic>", "[音乐]"),
        (r"<mpshop[^>]*?js_editor_shop[^>]*?></mpshop>", "[小店]"),
        (r#"<iframe[^>]*?class=['"][^'"]*video_iframe[^>]*?></iframe>"#, "[视频]"),
        (r"(?i)<iframe[^>]*?js_editor_vote_card[^<]*?</iframe>", "[投票]"),
        (r"<mp-weapp[^>]*?weapp_element[^>]*?></mp-weapp>", "[小程序]"),
        (r"<mp-miniprogram[^>]*?></mp-miniprogram>", "[小程序]"),
        (r"<mpproduct[^>]*?></mpproduct>", "[商品]"),
        (r"<mpcps[^>]*?></mpcps>", "[商品]"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).expect("static regex"), label))
    .collect()
});

/// Classify the fetched document: readable, deleted by its author, or unavailable
pub fn check_availability(document: &Document, url: &str) -> Result<()> {
    if document.select_first(CONTENT_SELECTOR).is_some() {
        return Ok(());
    }
    if document.select_first(DELETED_MARKER_SELECTOR).is_some() {
        return Err(Error::ArticleDeleted {
            url: url.to_string(),
        });
    }
    Err(Error::ArticleUnavailable {
        url: url.to_string(),
    })
}

/// Drop hidden-content styling and nodes that never belong in an archive
pub(crate) fn clean(article: &Element) {
    if let Some(content) = article.select_first(CONTENT_SELECTOR) {
        content.remove_attr("style");
    }
    for selector in REMOVED_SELECTORS {
        for node in article.select_all(selector) {
            node.remove();
        }
    }
}

/// Decide the layout variant from marker elements.
///
/// Precedence: forwarded card, image share, video share, plain.
pub fn classify(document: &Document, article: &Element) -> ArticleShape {
    if document.select_first("#js_share_source").is_some()
        && document.select_first("#content_tpl").is_some()
    {
        ArticleShape::CardForward
    } else if article.select_first("#js_image_desc").is_some() {
        ArticleShape::ImageShare
    } else if article.select_first("#js_common_share_desc").is_some()
        || article
            .select_first(".js_video_channel_container > #js_mpvedio")
            .is_some()
    {
        ArticleShape::VideoShare
    } else {
        ArticleShape::Plain
    }
}

/// Fill the placeholders of the given shape; returns the number of optional
/// values that were absent
pub(crate) fn populate(
    shape: ArticleShape,
    document: &Document,
    article: &Element,
    ctx: &ExtractionContext,
    body_classes: &mut Vec<String>,
) -> usize {
    match shape {
        ArticleShape::Plain => 0,
        ArticleShape::CardForward => populate_card_forward(document),
        ArticleShape::ImageShare => {
            add_classes(body_classes, IMAGE_SHARE_CLASSES);
            populate_image_share(article, ctx)
        }
        ArticleShape::VideoShare => {
            add_classes(body_classes, VIDEO_SHARE_CLASSES);
            populate_video_share(article, ctx)
        }
    }
}

fn add_classes(body_classes: &mut Vec<String>, classes: &[&str]) {
    for class in classes {
        if !body_classes.iter().any(|c| c == class) {
            body_classes.push(class.to_string());
        }
    }
}

fn populate_card_forward(document: &Document) -> usize {
    let (Some(source), Some(template)) = (
        document.select_first("#js_share_source"),
        document.select_first("#content_tpl"),
    ) else {
        return 0;
    };
    let mut missing = 0;

    if let Some(content) = document.select_first(CONTENT_SELECTOR) {
        content.set_inner_html(&card_digest(&template.inner_html()));
    } else {
        missing += 1;
    }

    match source.attr("data-url") {
        Some(target) => {
            let link = format!(
                r#"<a href="{}" class="{}">{}</a>"#,
                escape_html(&target),
                escape_html(&source.attr("class").unwrap_or_default()),
                source.inner_html()
            );
            source.replace_with_html(&link);
        }
        None => missing += 1,
    }
    missing
}

/// Digest markup of a forwarded card's template: widgets become bracket
/// placeholders, text is escaped, capped and split into paragraphs
pub(crate) fn card_digest(template_html: &str) -> String {
    let mut html = template_html.to_string();
    for (pattern, label) in CARD_PLACEHOLDERS.iter() {
        html = pattern
            .replace_all(&html, format!("<p>{label}</p>").as_str())
            .into_owned();
    }
    let scratch = Document::parse(&format!("<div id=\"digest\">{html}</div>"));
    let text = scratch
        .select_first("#digest")
        .map(|d| d.inner_text())
        .unwrap_or_default();

    let mut text = text.replace('<', "&lt;").replace('>', "&gt;").trim().to_string();
    if text.chars().count() > DIGEST_MAX_CHARS {
        text = text.chars().take(DIGEST_MAX_CHARS).collect::<String>() + "...";
    }
    text.split('\n').map(|line| format!("<p>{line}</p>")).collect()
}

fn populate_image_share(article: &Element, ctx: &ExtractionContext) -> usize {
    let mut missing = 0;

    match (&ctx.gallery, article.select_first("#js_image_desc")) {
        (Some(gallery), Some(node)) => {
            node.set_inner_html(&gallery_description(&gallery.desc));
            if let Some(profile) = article.select_first("#js_top_profile") {
                profile.remove_class("profile_area_hide");
            }
        }
        _ => missing += 1,
    }

    match article.select_first("#js_share_content_page_hd") {
        Some(container) if !ctx.pictures.is_empty() => {
            let mut html = format!(r#"<div style="{GALLERY_WRAPPER_STYLE}">"#);
            for picture in ctx.pictures.iter().take(MAX_GALLERY_PICTURES) {
                html.push_str(&format!(
                    r#"<img src="{}" alt="" style="{GALLERY_IMAGE_STYLE}">"#,
                    escape_html(&picture.cdn_url)
                ));
            }
            html.push_str("</div>");
            container.set_inner_html(&html);
        }
        _ => missing += 1,
    }
    missing
}

/// Gallery description as markup: line breaks become `<br>`, whitespace is kept
fn gallery_description(desc: &str) -> String {
    let desc = desc.replace('\r', "");
    let mut out = String::with_capacity(desc.len());
    for (i, line) in desc.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<br>");
        }
        let decoded = decode_html_entities(line);
        for c in decoded.chars() {
            match c {
                c if c.is_whitespace() => out.push_str("&nbsp;"),
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                c => out.push(c),
            }
        }
    }
    out
}

fn populate_video_share(article: &Element, ctx: &ExtractionContext) -> usize {
    let Some(node) = article.select_first("#js_common_share_desc") else {
        return 0;
    };
    match &ctx.share_description {
        Some(desc) => {
            let html = desc
                .replace('\r', "")
                .split('\n')
                .map(escape_html)
                .collect::<Vec<_>>()
                .join("<br>");
            node.set_inner_html(&html);
            0
        }
        None => 1,
    }
}
