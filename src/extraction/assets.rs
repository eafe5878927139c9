//! Asset references: what to download and where the local path goes afterwards.

use super::ExtractionContext;
use super::metadata::{Rendition, VideoPageInfo};
use crate::markup::Element;
use crate::types::AssetKind;
use crate::utils::escape_html;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Stream endpoint for audio widgets, keyed by their encoded file id
pub const AUDIO_STREAM_BASE: &str = "https://res.wx.qq.com/voice/getvoice?mediaid=";

/// Embeddable player for third-party inline videos
const EMBED_PLAYER_BASE: &str = "https://v.qq.com/txp/iframe/player.html?vid=";

const SHARE_PLAYER_STYLE: &str =
    "height: 381px;background: #000;border-radius: 4px; overflow: hidden;margin-bottom: 12px;";
const INLINE_PLAYER_STYLE: &str =
    "height: 508px;background: #000;border-radius: 4px; overflow: hidden;margin-bottom: 12px;";

/// `background[-image]: url(...)` with an absolute or protocol-relative URL
#[allow(clippy::expect_used)]
pub(crate) static BACKGROUND_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?P<prefix>background(?:-image)?\s*:\s*url\(\s*["']?)(?P<url>(?:https?:)?//[^)"'\s]+)(?P<suffix>["']?\s*\))"#,
    )
    .expect("static regex")
});

#[allow(clippy::expect_used)]
static EMBED_PREVIEW_VID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)v\.qq\.com/iframe/preview\.html\?vid=([\da-z]+)").expect("static regex")
});

/// Synthetic identifier correlating an audio widget's cover and stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WidgetId(u32);

/// Where a downloaded asset's local path is written
#[derive(Clone)]
pub enum PatchTarget {
    /// An attribute of a specific node
    Attribute {
        /// Node to patch
        element: Element,
        /// Attribute name
        name: &'static str,
    },
    /// An attribute of an audio widget, resolved through the widget map
    Widget {
        /// Widget identifier
        widget: WidgetId,
        /// Attribute name
        name: &'static str,
    },
    /// Every background occurrence of the origin URL in inline styles and style sheets
    StyleText,
}

impl std::fmt::Debug for PatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchTarget::Attribute { element, name } => {
                write!(f, "Attribute({} @{name})", element.tag())
            }
            PatchTarget::Widget { widget, name } => write!(f, "Widget({widget:?} @{name})"),
            PatchTarget::StyleText => f.write_str("StyleText"),
        }
    }
}

/// One binary resource referenced by the article
#[derive(Clone, Debug)]
pub struct AssetReference {
    /// Asset category
    pub kind: AssetKind,
    /// Origin URL as it appears in the document
    pub url: String,
    /// Where the local path goes
    pub target: PatchTarget,
}

impl AssetReference {
    fn new(kind: AssetKind, url: impl Into<String>, target: PatchTarget) -> Self {
        Self {
            kind,
            url: url.into(),
            target,
        }
    }

    /// URL to request (markup-escaped ampersands undone)
    pub fn fetch_url(&self) -> String {
        self.url.replace("&amp;", "&")
    }
}

/// Every asset reference of one article, grouped by download batch
#[derive(Default)]
pub struct AssetPlan {
    /// CSS background images, one per distinct URL
    pub backgrounds: Vec<AssetReference>,
    /// Inline and gallery images
    pub images: Vec<AssetReference>,
    /// Audio widget covers and streams
    pub audio: Vec<AssetReference>,
    /// Video posters and selected renditions
    pub video: Vec<AssetReference>,
    /// Optional assets that were absent from the document
    pub missing: usize,
    pub(crate) widgets: HashMap<WidgetId, Element>,
    pub(crate) style_scopes: Vec<Element>,
}

impl std::fmt::Debug for AssetPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetPlan")
            .field("backgrounds", &self.backgrounds)
            .field("images", &self.images)
            .field("audio", &self.audio)
            .field("video", &self.video)
            .field("missing", &self.missing)
            .field("widgets", &self.widgets.len())
            .finish_non_exhaustive()
    }
}

impl AssetPlan {
    /// Total number of references across all batches
    pub fn len(&self) -> usize {
        self.backgrounds.len() + self.images.len() + self.audio.len() + self.video.len()
    }

    /// Whether the article references no assets
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Node owning an audio widget
    pub fn widget(&self, id: WidgetId) -> Option<&Element> {
        self.widgets.get(&id)
    }

    /// Rewrite every background occurrence of `origin` to `local`; returns the count
    pub(crate) fn rewrite_backgrounds(&self, origin: &str, local: &str) -> usize {
        let mut rewritten = 0;
        let mut replace = |text: &str| -> Option<String> {
            let mut hits = 0;
            let replaced = BACKGROUND_URL.replace_all(text, |caps: &Captures<'_>| {
                if &caps["url"] == origin {
                    hits += 1;
                    format!("{}{local}{}", &caps["prefix"], &caps["suffix"])
                } else {
                    caps[0].to_string()
                }
            });
            rewritten += hits;
            (hits > 0).then(|| replaced.into_owned())
        };

        for scope in &self.style_scopes {
            for element in scope.select_all("[style]") {
                if let Some(style) = element.attr("style") {
                    if let Some(updated) = replace(&style) {
                        element.set_attr("style", &updated);
                    }
                }
            }
            for sheet in scope.select_all("style") {
                if let Some(updated) = replace(&sheet.text()) {
                    sheet.set_text(&updated);
                }
            }
        }
        rewritten
    }
}

/// Lowest-bandwidth rendition: smallest known file size, else smallest frame, else first
pub fn select_rendition(renditions: &[Rendition]) -> Option<&Rendition> {
    let usable: Vec<&Rendition> = renditions.iter().filter(|r| !r.url.is_empty()).collect();
    if let Some(smallest) = usable
        .iter()
        .filter_map(|r| r.filesize.map(|size| (size, *r)))
        .min_by_key(|(size, _)| *size)
    {
        return Some(smallest.1);
    }
    if let Some(smallest) = usable
        .iter()
        .filter_map(|r| match (r.width, r.height) {
            (Some(w), Some(h)) => Some((w.saturating_mul(h), *r)),
            _ => None,
        })
        .min_by_key(|(area, _)| *area)
    {
        return Some(smallest.1);
    }
    usable.first().copied()
}

/// Build the asset plan for a cleaned, populated article subtree.
///
/// Video players are created here with origin `src`/`poster` values so that a
/// failed download leaves a working remote reference behind.
pub(crate) fn plan(article: &Element, bottom_bar: Option<&Element>, ctx: &ExtractionContext) -> AssetPlan {
    let mut plan = AssetPlan {
        style_scopes: std::iter::once(article.clone())
            .chain(bottom_bar.cloned())
            .collect(),
        ..AssetPlan::default()
    };

    plan_backgrounds(&mut plan);
    plan_images(&mut plan, article);
    plan_audio(&mut plan, article);
    plan_share_video(&mut plan, article, ctx);
    plan_inline_videos(&mut plan, article, ctx);
    plan
}

fn plan_backgrounds(plan: &mut AssetPlan) {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let mut collect = |text: &str| {
        for caps in BACKGROUND_URL.captures_iter(text) {
            let url = caps["url"].to_string();
            if seen.insert(url.clone()) {
                found.push(url);
            }
        }
    };
    for scope in &plan.style_scopes {
        for element in scope.select_all("[style]") {
            if let Some(style) = element.attr("style") {
                collect(&style);
            }
        }
        for sheet in scope.select_all("style") {
            collect(&sheet.text());
        }
    }
    plan.backgrounds = found
        .into_iter()
        .map(|url| AssetReference::new(AssetKind::Background, url, PatchTarget::StyleText))
        .collect();
}

fn plan_images(plan: &mut AssetPlan, article: &Element) {
    for img in article.select_all("img") {
        let sources: Vec<String> = ["src", "data-src"]
            .iter()
            .filter_map(|name| img.attr(name))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();
        // Inline placeholders give way to the lazy-load source
        let url = sources.iter().find(|value| !value.starts_with("data:"));
        match url {
            Some(url) if url.starts_with("./assets/") => {}
            Some(url) => plan.images.push(AssetReference::new(
                AssetKind::Image,
                url.as_str(),
                PatchTarget::Attribute {
                    element: img,
                    name: "src",
                },
            )),
            None if !sources.is_empty() => {}
            None => {
                tracing::debug!("image without source skipped");
                plan.missing += 1;
            }
        }
    }
}

fn plan_audio(plan: &mut AssetPlan, article: &Element) {
    for (index, widget) in article.select_all("mp-common-mpaudio").into_iter().enumerate() {
        let id = WidgetId(index as u32);

        match widget.attr("cover").filter(|c| !c.is_empty()) {
            Some(cover) => plan.audio.push(AssetReference::new(
                AssetKind::Card,
                cover,
                PatchTarget::Widget {
                    widget: id,
                    name: "cover",
                },
            )),
            None => plan.missing += 1,
        }
        match widget.attr("voice_encode_fileid").filter(|f| !f.is_empty()) {
            Some(file_id) => plan.audio.push(AssetReference::new(
                AssetKind::Audio,
                format!("{AUDIO_STREAM_BASE}{file_id}"),
                PatchTarget::Widget {
                    widget: id,
                    name: "src",
                },
            )),
            None => plan.missing += 1,
        }
        plan.widgets.insert(id, widget);
    }
}

/// Player markup with origin references
fn player_html(style: &str, src: Option<&str>, poster: Option<&str>) -> String {
    let mut attrs = String::new();
    if let Some(src) = src {
        attrs.push_str(&format!(r#" src="{}""#, escape_html(src)));
    }
    if let Some(poster) = poster {
        attrs.push_str(&format!(r#" poster="{}""#, escape_html(poster)));
    }
    format!(
        r#"<div style="{style}"><video{attrs} controls style="width: 100%;height: 100%;"></video></div>"#
    )
}

fn push_player_references(plan: &mut AssetPlan, video: Element, src: Option<String>, poster: Option<String>) {
    if let Some(poster) = poster {
        plan.video.push(AssetReference::new(
            AssetKind::Card,
            poster,
            PatchTarget::Attribute {
                element: video.clone(),
                name: "poster",
            },
        ));
    }
    if let Some(src) = src {
        plan.video.push(AssetReference::new(
            AssetKind::Video,
            src,
            PatchTarget::Attribute {
                element: video,
                name: "src",
            },
        ));
    }
}

fn plan_share_video(plan: &mut AssetPlan, article: &Element, ctx: &ExtractionContext) {
    let Some(container) = article.select_first(".js_video_channel_container > #js_mpvedio") else {
        return;
    };
    let Some(rendition) = select_rendition(&ctx.video_renditions) else {
        tracing::debug!("shared video has no renditions");
        plan.missing += 1;
        return;
    };
    let src = rendition.url.replace("&amp;", "&");
    let poster = ctx.video_cover.clone();
    if poster.is_none() {
        plan.missing += 1;
    }

    container.append_html(&player_html(SHARE_PLAYER_STYLE, Some(&src), poster.as_deref()));
    match container.select_all("video").pop() {
        Some(video) => push_player_references(plan, video, Some(src), poster),
        None => plan.missing += 1,
    }
}

fn inline_sources(info: &VideoPageInfo) -> (Option<String>, Option<String>) {
    let src = if info.is_hosted() {
        select_rendition(&info.mp_video_trans_info).map(|r| r.url.replace("&amp;", "&"))
    } else {
        None
    };
    let poster = info.cover_url.clone().filter(|c| !c.is_empty());
    (src, poster)
}

fn plan_inline_videos(plan: &mut AssetPlan, article: &Element, ctx: &ExtractionContext) {
    for iframe in article.select_all("iframe.video_iframe") {
        match iframe.attr("data-mpvid").filter(|v| !v.is_empty()) {
            Some(mpvid) => {
                let Some(info) = ctx.inline_videos.iter().find(|info| info.video_id == mpvid) else {
                    tracing::debug!(mpvid = %mpvid, "inline video has no page info");
                    plan.missing += 1;
                    continue;
                };
                let (src, poster) = inline_sources(info);
                let html = player_html(INLINE_PLAYER_STYLE, src.as_deref(), poster.as_deref());
                let video = iframe
                    .replace_with_html(&html)
                    .and_then(|player| player.select_first("video"));
                match video {
                    Some(video) => push_player_references(plan, video, src, poster),
                    None => plan.missing += 1,
                }
            }
            None => {
                let vid = iframe
                    .attr("data-src")
                    .and_then(|src| EMBED_PREVIEW_VID.captures(&src).map(|c| c[1].to_string()));
                if let Some(vid) = vid {
                    iframe.set_attr("src", &format!("{EMBED_PLAYER_BASE}{vid}"));
                    iframe.set_attr("width", "100%");
                }
            }
        }
    }
}
