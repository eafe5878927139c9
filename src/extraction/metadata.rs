//! Typed views over evaluated statement values, and the metadata placeholders
//! (publish time, region label, title-modified flag) they fill.

use super::ExtractionContext;
use crate::markup::Element;
use crate::utils::format_publish_time;
use serde::{Deserialize, Serialize};

/// Country id whose region label is the province name instead of the country name
const DOMESTIC_COUNTRY_ID: i64 = 156;

/// `window.ip_wording`
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct IpWording {
    /// Country display name
    #[serde(rename = "countryName", default)]
    pub country_name: Option<String>,
    /// Numeric country id, sometimes quoted
    #[serde(rename = "countryId", default, deserialize_with = "lenient::opt_i64")]
    pub country_id: Option<i64>,
    /// Province display name
    #[serde(rename = "provinceName", default)]
    pub province_name: Option<String>,
}

impl IpWording {
    /// Region label shown next to the author, `None` when nothing should be shown
    pub fn label(&self) -> Option<String> {
        let label = match self.country_id {
            Some(DOMESTIC_COUNTRY_ID) => self.province_name.clone(),
            Some(id) if id != 0 => self.country_name.clone(),
            _ => None,
        };
        label.filter(|l| !l.trim().is_empty())
    }
}

/// `window.__QMTPL_SSR_DATA__` (only the gallery description is used)
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GalleryData {
    /// Free-text gallery description
    #[serde(default)]
    pub desc: String,
}

/// One entry of `window.picture_page_info_list`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PictureInfo {
    /// Picture URL
    #[serde(default)]
    pub cdn_url: String,
}

/// One transcoded rendition of a video
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    /// Stream URL (may carry `&amp;` escapes)
    #[serde(default)]
    pub url: String,
    /// Size in bytes, when known
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub filesize: Option<u64>,
    /// Frame width in pixels
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub width: Option<u64>,
    /// Frame height in pixels
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub height: Option<u64>,
}

/// One entry of `videoPageInfos`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VideoPageInfo {
    /// Id referenced by `data-mpvid` on the inline iframe
    #[serde(default)]
    pub video_id: String,
    /// 1 when the video is hosted by the platform and has renditions
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub is_mp_video: Option<i64>,
    /// Cover image URL
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Available renditions
    #[serde(default)]
    pub mp_video_trans_info: Vec<Rendition>,
}

impl VideoPageInfo {
    /// Whether the stream itself can be downloaded
    pub fn is_hosted(&self) -> bool {
        self.is_mp_video == Some(1) && !self.mp_video_trans_info.is_empty()
    }
}

/// Metadata rendered into the article placeholders
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArticleMetadata {
    /// Publish time as shown (`YYYY年MM月DD日 HH:mm`)
    pub publish_time: Option<String>,
    /// Whether the title was edited after publishing
    pub title_modified: Option<bool>,
    /// Region label (province or country)
    pub region: Option<String>,
}

/// Fill `#publish_time`, `#js_ip_wording` and `#js_title_modify` from the context
pub(crate) fn render(
    article: &Element,
    ctx: &ExtractionContext,
    utc_offset_minutes: Option<i32>,
) -> ArticleMetadata {
    let mut metadata = ArticleMetadata::default();

    if let Some(timestamp) = ctx.create_time {
        metadata.publish_time = format_publish_time(timestamp, utc_offset_minutes);
        match (&metadata.publish_time, article.select_first("#publish_time")) {
            (Some(shown), Some(node)) => node.set_text(shown),
            (Some(_), None) => tracing::debug!("publish time placeholder missing"),
            _ => {}
        }
    }

    if let Some(label) = ctx.ip_wording.as_ref().and_then(IpWording::label) {
        if let (Some(wrapper), Some(node)) = (
            article.select_first("#js_ip_wording_wrp"),
            article.select_first("#js_ip_wording"),
        ) {
            node.set_text(&label);
            wrapper.set_style_property("display", "inline-block");
        }
        metadata.region = Some(label);
    }

    if let Some(modified) = ctx.title_modified {
        if let Some(wrapper) = article.select_first("#js_title_modify_wrp") {
            if modified {
                if let Some(node) = article.select_first("#js_title_modify") {
                    node.set_text("标题已修改");
                }
                wrapper.set_style_property("display", "inline-block");
            } else {
                wrapper.remove();
            }
        }
        metadata.title_modified = Some(modified);
    }

    metadata
}

// Lenient numeric deserializers: pages emit ids and sizes as numbers, quoted
// numbers or empty strings interchangeably.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn as_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(as_i64(&value))
    }

    pub fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(as_i64(&value).and_then(|n| u64::try_from(n).ok()))
    }
}
