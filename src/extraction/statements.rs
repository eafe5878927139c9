//! Locating embedded initialization statements and materializing their values.
//!
//! Each statement is found by its left-hand side wherever it appears in the page's
//! scripts. Comparisons are ignored, and an occurrence whose value does not parse
//! to the expected shape is passed over in favour of a later one.

use super::ExtractionContext;
use super::literal::{is_truthy, parse_prefix};
use super::metadata::{GalleryData, IpWording, PictureInfo, Rendition, VideoPageInfo};
use crate::error::LiteralError;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;

macro_rules! lhs {
    ($name:ident, $pattern:expr) => {
        #[allow(clippy::expect_used)]
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("static regex"));
    };
}

lhs!(CREATE_TIME, r"\bvar\s+oriCreateTime\s*=");
lhs!(IP_WORDING, r"\bwindow\.ip_wording\s*=");
lhs!(TITLE_MODIFIED, r"\bwindow\.isTitleModified\s*=");
lhs!(GALLERY_DATA, r"\bwindow\.__QMTPL_SSR_DATA__\s*=");
lhs!(GALLERY_PICTURES, r"\bwindow\.picture_page_info_list\s*=");
lhs!(SHARE_DESCRIPTION, r"\bvar\s+videoContentNoEncode\s*=");
lhs!(VIDEO_COVER, r"\bwindow\.__mpVideoCoverUrl\s*=");
lhs!(VIDEO_RENDITIONS, r"\bwindow\.__mpVideoTransInfo\s*=");
lhs!(INLINE_VIDEOS, r"\bvar\s+videoPageInfos\s*=");
lhs!(INLINE_VIDEO_PUSH, r"\bvideoPageInfos\.push\(");

/// Evaluate every known statement found in `scripts`
pub(crate) fn evaluate(scripts: &[String]) -> ExtractionContext {
    let create_time = first_value(scripts, &CREATE_TIME, |v| timestamp(v).is_some())
        .as_ref()
        .and_then(timestamp);

    let ip_wording = first_typed::<IpWording>(scripts, &IP_WORDING, Value::is_object);

    let title_modified = first_value(scripts, &TITLE_MODIFIED, |v| {
        v.is_number() || v.is_boolean()
    })
    .map(|v| is_truthy(&v));

    let gallery = first_typed::<GalleryData>(scripts, &GALLERY_DATA, |v| {
        v.get("desc").is_some_and(Value::is_string)
    });

    let pictures = first_typed::<Vec<PictureInfo>>(scripts, &GALLERY_PICTURES, Value::is_array)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.cdn_url.is_empty())
        .collect();

    let share_description = first_value(scripts, &SHARE_DESCRIPTION, Value::is_string)
        .and_then(|v| v.as_str().map(str::to_string));

    let video_cover = first_value(scripts, &VIDEO_COVER, Value::is_string)
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|url| !url.is_empty());

    let video_renditions = first_typed::<Vec<Rendition>>(scripts, &VIDEO_RENDITIONS, Value::is_array)
        .unwrap_or_default();

    let mut inline_videos =
        first_typed::<Vec<VideoPageInfo>>(scripts, &INLINE_VIDEOS, Value::is_array)
            .unwrap_or_default();
    inline_videos.extend(pushed_values::<VideoPageInfo>(scripts, &INLINE_VIDEO_PUSH));

    ExtractionContext {
        create_time,
        ip_wording,
        title_modified,
        gallery,
        pictures,
        share_description,
        video_cover,
        video_renditions,
        inline_videos,
    }
}

fn timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First occurrence of `lhs` whose value parses and passes `accept`
fn first_value(scripts: &[String], lhs: &Regex, accept: impl Fn(&Value) -> bool) -> Option<Value> {
    for script in scripts {
        for found in lhs.find_iter(script) {
            let rest = &script[found.end()..];
            // `x ==` / `x ===` is a comparison, not an assignment
            if rest.starts_with('=') {
                continue;
            }
            match statement_value(rest) {
                Ok(value) if accept(&value) => return Some(value),
                Ok(_) => {
                    tracing::debug!(statement = found.as_str(), "statement value has unexpected shape");
                }
                Err(e) => {
                    tracing::debug!(statement = found.as_str(), error = %e, "skipping unparsable statement");
                }
            }
        }
    }
    None
}

/// Like [`first_value`], deserialized into a typed view
fn first_typed<T: DeserializeOwned>(
    scripts: &[String],
    lhs: &Regex,
    accept: impl Fn(&Value) -> bool,
) -> Option<T> {
    first_value(scripts, lhs, |v| {
        accept(v) && serde_json::from_value::<T>(v.clone()).is_ok()
    })
    .and_then(|v| serde_json::from_value(v).ok())
}

/// Arguments of every `name.push(<value>)` call
fn pushed_values<T: DeserializeOwned>(scripts: &[String], call: &Regex) -> Vec<T> {
    let mut values = Vec::new();
    for script in scripts {
        for found in call.find_iter(script) {
            let rest = &script[found.end()..];
            let parsed = parse_prefix(rest).and_then(|(value, used)| {
                if rest[used..].starts_with(')') {
                    Ok(value)
                } else {
                    Err(unexpected_at(rest, used))
                }
            });
            match parsed.map(serde_json::from_value::<T>) {
                Ok(Ok(value)) => values.push(value),
                Ok(Err(e)) => tracing::debug!(error = %e, "pushed value has unexpected shape"),
                Err(e) => tracing::debug!(error = %e, "skipping unparsable push"),
            }
        }
    }
    values
}

/// Parse the right-hand side and check that the statement ends after it
fn statement_value(rest: &str) -> Result<Value, LiteralError> {
    let (value, used) = parse_prefix(rest)?;
    let consumed = &rest[..used];
    let trailing = &consumed[consumed.trim_end().len()..];
    match rest[used..].chars().next() {
        None | Some(';') | Some('}') | Some(',') | Some(')') => Ok(value),
        // Automatic semicolon insertion at a line break
        Some(_) if trailing.contains('\n') => Ok(value),
        Some(_) => Err(unexpected_at(rest, used)),
    }
}

fn unexpected_at(rest: &str, offset: usize) -> LiteralError {
    match rest[offset..].chars().next() {
        Some(found) => LiteralError::UnexpectedChar { found, offset },
        None => LiteralError::UnexpectedEnd { offset },
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn scripts(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn statements_found_anywhere_in_scripts() {
        let ctx = evaluate(&scripts(&[
            "var a = 1;\n var oriCreateTime = '1700000000';",
            r#"window.ip_wording = {
                countryName: '中国',
                countryId: '156',
                provinceName: '北京',
                cityName: ''
            };
            window.isTitleModified = "1" * 1;"#,
        ]));
        assert_eq!(ctx.create_time, Some(1_700_000_000));
        assert_eq!(ctx.ip_wording.unwrap().province_name.as_deref(), Some("北京"));
        assert_eq!(ctx.title_modified, Some(true));
    }

    #[test]
    fn comparisons_are_not_statements() {
        let ctx = evaluate(&scripts(&[
            "if (window.isTitleModified == 1) {}\nwindow.isTitleModified = \"\" * 1;",
        ]));
        assert_eq!(ctx.title_modified, Some(false));
    }

    #[test]
    fn later_occurrence_used_when_first_does_not_parse() {
        let ctx = evaluate(&scripts(&[
            "window.__mpVideoCoverUrl = getCover();",
            "window.__mpVideoCoverUrl = 'https://img.example/cover.jpg';",
        ]));
        assert_eq!(ctx.video_cover.as_deref(), Some("https://img.example/cover.jpg"));
    }

    #[test]
    fn later_occurrence_used_when_first_has_wrong_shape() {
        let ctx = evaluate(&scripts(&[
            "window.__mpVideoTransInfo = null;\nwindow.__mpVideoTransInfo = [{url: 'https://v.example/1.mp4', filesize: 10}];",
        ]));
        assert_eq!(ctx.video_renditions.len(), 1);
        assert_eq!(ctx.video_renditions[0].filesize, Some(10));
    }

    #[test]
    fn fallback_description_is_parsed() {
        let ctx = evaluate(&scripts(&[
            "var videoContentNoEncode = window.a_value_which_never_exists || '第一行\\n第二行';",
        ]));
        assert_eq!(ctx.share_description.as_deref(), Some("第一行\n第二行"));
    }

    #[test]
    fn gallery_statements() {
        let ctx = evaluate(&scripts(&[
            "window.__QMTPL_SSR_DATA__ = { desc: 'hello world', title: 'x' };",
            "window.picture_page_info_list = [{cdn_url: 'https://p.example/1.jpg'}, {cdn_url: ''}, {cdn_url: 'https://p.example/2.jpg'},].slice(0, 20);",
        ]));
        assert_eq!(ctx.gallery.unwrap().desc, "hello world");
        assert_eq!(ctx.pictures.len(), 2);
    }

    #[test]
    fn inline_videos_from_literal_and_pushes() {
        let ctx = evaluate(&scripts(&[
            r#"var videoPageInfos = [{ video_id: 'wxv_1', is_mp_video: 1, cover_url: 'https://c.example/1.jpg', mp_video_trans_info: [{url: 'https://v.example/1.mp4?a=1&amp;b=2'}] }];
               videoPageInfos.push({ video_id: 'wxv_2', is_mp_video: '1', cover_url: '', mp_video_trans_info: [] });
               window.__videoPageInfos = videoPageInfos;"#,
        ]));
        assert_eq!(ctx.inline_videos.len(), 2);
        assert_eq!(ctx.inline_videos[0].video_id, "wxv_1");
        assert!(ctx.inline_videos[0].is_hosted());
        assert!(!ctx.inline_videos[1].is_hosted());
    }

    #[test]
    fn statement_without_semicolon_ends_at_line_break() {
        let ctx = evaluate(&scripts(&["var oriCreateTime = '1700000000'\nvar next = 1"]));
        assert_eq!(ctx.create_time, Some(1_700_000_000));
    }

    #[test]
    fn trailing_code_rejects_statement() {
        assert!(statement_value(" 'a' + b;").is_err());
        assert!(statement_value(" 'a';").is_ok());
    }

    #[test]
    fn empty_scripts_yield_empty_context() {
        let ctx = evaluate(&[]);
        assert!(ctx.create_time.is_none());
        assert!(ctx.inline_videos.is_empty());
        assert!(ctx.pictures.is_empty());
    }
}
