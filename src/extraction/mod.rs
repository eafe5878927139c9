//! Article extraction
//!
//! Turns a fetched article page into a cleaned `#js_article` subtree plus an
//! [`AssetPlan`] describing every binary resource the archive needs. Page data that
//! is only available through inline initialization scripts is recovered with a
//! narrow literal parser ([`literal`]); nothing on the page is executed.

mod assets;
pub mod literal;
pub mod metadata;
pub mod shape;
mod statements;

pub use assets::{
    AUDIO_STREAM_BASE, AssetPlan, AssetReference, PatchTarget, WidgetId, select_rendition,
};
pub use metadata::{
    ArticleMetadata, GalleryData, IpWording, PictureInfo, Rendition, VideoPageInfo,
};

use crate::error::{Error, Result};
use crate::markup::{Document, Element};
use crate::types::ArticleShape;

/// Values recovered from the page's initialization statements
#[derive(Clone, Debug, Default)]
pub struct ExtractionContext {
    /// `oriCreateTime`, seconds since the epoch
    pub create_time: Option<i64>,
    /// `window.ip_wording`
    pub ip_wording: Option<IpWording>,
    /// `window.isTitleModified`
    pub title_modified: Option<bool>,
    /// `window.__QMTPL_SSR_DATA__`
    pub gallery: Option<GalleryData>,
    /// `window.picture_page_info_list`, entries without a URL dropped
    pub pictures: Vec<PictureInfo>,
    /// `videoContentNoEncode`
    pub share_description: Option<String>,
    /// `window.__mpVideoCoverUrl`
    pub video_cover: Option<String>,
    /// `window.__mpVideoTransInfo`
    pub video_renditions: Vec<Rendition>,
    /// `videoPageInfos`, including pushed entries
    pub inline_videos: Vec<VideoPageInfo>,
}

impl ExtractionContext {
    /// Evaluate the statements found in the given script texts
    pub fn from_scripts(scripts: &[String]) -> Self {
        statements::evaluate(scripts)
    }

    /// Evaluate the statements found in every `<script>` of the document
    pub fn from_document(document: &Document) -> Self {
        let scripts: Vec<String> = document
            .select_all("script")
            .iter()
            .map(Element::text)
            .collect();
        Self::from_scripts(&scripts)
    }
}

/// A parsed article ready for asset download and rendering
pub struct ArticleDocument {
    /// The whole page; `article` and `bottom_bar` point into it
    pub document: Document,
    /// The `#js_article` subtree
    pub article: Element,
    /// The `#js_article_bottom_bar` fragment rendered after the article
    pub bottom_bar: Option<Element>,
    /// Body classes carried into the archive shell
    pub body_classes: Vec<String>,
    /// Layout variant
    pub shape: ArticleShape,
    /// Metadata rendered into placeholders
    pub metadata: ArticleMetadata,
}

impl std::fmt::Debug for ArticleDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleDocument")
            .field("body_classes", &self.body_classes)
            .field("shape", &self.shape)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Parse and prepare an article page.
///
/// Runs the availability check, evaluates initialization statements (before
/// scripts are stripped), cleans the subtree, fills metadata placeholders,
/// populates the layout variant and plans the asset downloads.
pub fn extract(
    html: &str,
    url: &str,
    utc_offset_minutes: Option<i32>,
) -> Result<(ArticleDocument, AssetPlan)> {
    let document = Document::parse(html);
    shape::check_availability(&document, url)?;

    let ctx = ExtractionContext::from_document(&document);

    let article = document
        .select_first("#js_article")
        .ok_or_else(|| Error::ArticleUnavailable {
            url: url.to_string(),
        })?;
    let bottom_bar = document.select_first("#js_article_bottom_bar");
    let mut body_classes = document
        .select_first("body")
        .map(|body| body.classes())
        .unwrap_or_default();

    shape::clean(&article);
    let metadata = metadata::render(&article, &ctx, utc_offset_minutes);

    let shape = shape::classify(&document, &article);
    let mut missing = shape::populate(shape, &document, &article, &ctx, &mut body_classes);

    let mut plan = assets::plan(&article, bottom_bar.as_ref(), &ctx);
    missing += plan.missing;
    plan.missing = missing;

    tracing::debug!(
        url = %url,
        ?shape,
        assets = plan.len(),
        missing,
        "article extracted"
    );

    Ok((
        ArticleDocument {
            document,
            article,
            bottom_bar,
            body_classes,
            shape,
            metadata,
        },
        plan,
    ))
}
