//! Link resolution: turning an arbitrary URL into a direct media URL.
//!
//! Direct media links (by path extension) pass through untouched. Anything
//! else is fetched as HTML and mined for OpenGraph metadata, in priority
//! order `og:video`, `og:image`, then any meta tag whose content mentions
//! `.gif`. Patterns are compile-time validated via the `lazy_regex!` macro.

// lazy_regex! uses once_cell internally; the patterns are compile-time checked
#![allow(clippy::non_std_lazy_statics)]

use crate::error::ResolveError;
use crate::pipeline::fetch::BROWSER_USER_AGENT;
use lazy_regex::lazy_regex;
use reqwest::header;
use tracing::debug;
use url::Url;

/// Extensions that are downloadable media without any scraping.
const DIRECT_MEDIA_EXTS: &[&str] = &["gif", "mp4", "webm", "webp", "png", "jpg", "jpeg"];

/// `<meta property="og:video" content="...">`
static RE_OG_VIDEO: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r#"(?is)<meta\b[^>]*\bproperty\s*=\s*["']og:video["'][^>]*\bcontent\s*=\s*["']([^"']+)["']"#
);

/// Same tag with `content` written before `property`
static RE_OG_VIDEO_REV: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r#"(?is)<meta\b[^>]*\bcontent\s*=\s*["']([^"']+)["'][^>]*\bproperty\s*=\s*["']og:video["']"#
);

/// `<meta property="og:image" content="...">`
static RE_OG_IMAGE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r#"(?is)<meta\b[^>]*\bproperty\s*=\s*["']og:image["'][^>]*\bcontent\s*=\s*["']([^"']+)["']"#
);

/// Same tag with `content` written before `property`
static RE_OG_IMAGE_REV: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r#"(?is)<meta\b[^>]*\bcontent\s*=\s*["']([^"']+)["'][^>]*\bproperty\s*=\s*["']og:image["']"#
);

/// Last resort: any meta tag whose content mentions a gif
static RE_META_GIF: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r#"(?is)<meta\b[^>]*\bcontent\s*=\s*["']([^"']*\.gif[^"']*)["']"#);

/// Lowercased extension from the path portion of a URL, query ignored.
#[must_use]
pub fn path_extension(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the URL's path extension marks it as directly downloadable media.
#[must_use]
pub fn is_direct_media(url: &str) -> bool {
    path_extension(url).is_some_and(|ext| DIRECT_MEDIA_EXTS.contains(&ext.as_str()))
}

/// Rewrite a WEBP format selector to request GIF instead. Some meme-image
/// CDNs serve the same asset in either format behind this query parameter.
#[must_use]
pub fn rewrite_webp_selector(url: &str) -> String {
    url.replacen("format=webp", "format=gif", 1)
}

fn extract_media_url(html: &str) -> Option<String> {
    let priority = [
        &*RE_OG_VIDEO,
        &*RE_OG_VIDEO_REV,
        &*RE_OG_IMAGE,
        &*RE_OG_IMAGE_REV,
        &*RE_META_GIF,
    ];
    priority.iter().find_map(|re| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Resolve `url` to a direct media URL.
///
/// # Errors
///
/// Returns [`ResolveError::PageFetch`] if the page cannot be fetched for
/// scraping, and [`ResolveError::NoMediaFound`] if no candidate is found.
/// A URL that already points at media never touches the network.
pub async fn resolve(client: &reqwest::Client, url: &str) -> Result<String, ResolveError> {
    if is_direct_media(url) {
        return Ok(rewrite_webp_selector(url));
    }

    let html = client
        .get(url)
        .header(header::USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(ResolveError::PageFetch)?
        .text()
        .await
        .map_err(ResolveError::PageFetch)?;

    let target = extract_media_url(&html).ok_or(ResolveError::NoMediaFound)?;
    debug!(%target, "scraped media url from page metadata");
    Ok(rewrite_webp_selector(&target))
}
