//! Utility functions for titles, paths, URLs and HTML text

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Maximum length (in characters) of a generated archive directory name
const MAX_DIR_NAME_CHARS: usize = 120;

#[allow(clippy::expect_used)]
static HIGHLIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<em class="highlight">(.+?)</em>"#).expect("static regex"));

#[allow(clippy::expect_used)]
static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").expect("static regex")
});

/// Remove search-highlight emphasis markup from a display title
///
/// ```
/// use article_dl::utils::strip_highlight;
///
/// assert_eq!(strip_highlight(r#"<em class="highlight">Rust</em> in 2024"#), "Rust in 2024");
/// ```
pub fn strip_highlight(title: &str) -> String {
    HIGHLIGHT_RE.replace_all(title, "$1").into_owned()
}

/// Turn a display title into a safe single-component directory name
///
/// Path separators, characters reserved on common filesystems and control characters
/// become `_`; surrounding whitespace and dots are trimmed; the result is capped in length.
pub fn sanitize_dir_name(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_matches('.').trim();
    let capped: String = trimmed.chars().take(MAX_DIR_NAME_CHARS).collect();
    if capped.is_empty() {
        "untitled".to_string()
    } else {
        capped
    }
}

/// Upgrade plain-scheme and protocol-relative URLs to `https://`
pub fn upgrade_to_https(url: &str) -> Cow<'_, str> {
    if let Some(rest) = url.strip_prefix("http://") {
        Cow::Owned(format!("https://{rest}"))
    } else if let Some(rest) = url.strip_prefix("//") {
        Cow::Owned(format!("https://{rest}"))
    } else {
        Cow::Borrowed(url)
    }
}

/// File extension for a response content type, `bin` when unknown or absent
///
/// Common web types map to their usual extension; anything else falls back to
/// the first extension `mime_guess` registers for the type.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let Some(content_type) = content_type else {
        return "bin";
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "image/avif" => "avif",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/mp2t" => "ts",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/aac" => "aac",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/amr" => "amr",
        "text/css" => "css",
        "text/html" => "html",
        "text/plain" => "txt",
        "application/json" => "json",
        "application/javascript" | "text/javascript" => "js",
        "font/woff" => "woff",
        "font/woff2" => "woff2",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|extensions| extensions.first().copied())
            .unwrap_or("bin"),
    }
}

/// Unique asset file name with the given extension
pub fn unique_asset_name(extension: &str) -> String {
    format!("{}.{extension}", uuid::Uuid::new_v4().simple())
}

/// Decode the HTML entities that commonly appear in embedded script strings
pub fn decode_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Escape text for inclusion in HTML element content or a quoted attribute
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Render a unix timestamp (seconds) as `YYYY年MM月DD日 HH:mm`
///
/// `utc_offset_minutes` selects a fixed offset; `None` uses the local timezone.
pub fn format_publish_time(timestamp: i64, utc_offset_minutes: Option<i32>) -> Option<String> {
    const FORMAT: &str = "%Y年%m月%d日 %H:%M";
    let utc = DateTime::from_timestamp(timestamp, 0)?;
    let rendered = match utc_offset_minutes {
        Some(minutes) => {
            let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
            offset.from_utc_datetime(&utc.naive_utc()).format(FORMAT).to_string()
        }
        None => utc.with_timezone(&Local).format(FORMAT).to_string(),
    };
    Some(rendered)
}
