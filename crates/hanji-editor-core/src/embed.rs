//! Embedded content (images, videos) and URL handling for embeds and links.

use std::sync::OnceLock;

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
use regex::Regex;
#[cfg(all(target_family = "wasm", target_os = "unknown"))]
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

/// Object replacement character. Every embed occupies exactly one char of the
/// surface's linear content model.
pub const EMBED_CHAR: char = '\u{FFFC}';

/// Protocols a link may use. Anything else is replaced by `about:blank`.
const LINK_PROTOCOLS: &[&str] = &["http", "https", "mailto", "tel", "sms"];

/// Non-text content inserted into a surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Embed {
    /// Image, usually a `data:` URL produced by the image pipeline.
    Image(String),
    /// Video iframe source.
    Video(String),
}

impl Embed {
    pub fn src(&self) -> &str {
        match self {
            Embed::Image(src) | Embed::Video(src) => src,
        }
    }

    /// Short label used in plain-text dumps.
    pub fn kind(&self) -> &'static str {
        match self {
            Embed::Image(_) => "image",
            Embed::Video(_) => "video",
        }
    }

    /// Build a video embed from a user-entered URL.
    pub fn video_from_url(url: &str) -> Result<Self, EmbedError> {
        normalize_video_url(url).map(Embed::Video)
    }
}

struct VideoPatterns {
    youtube_watch: Regex,
    youtube_short: Regex,
    vimeo: Regex,
}

fn video_patterns() -> &'static VideoPatterns {
    static PATTERNS: OnceLock<VideoPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| VideoPatterns {
        youtube_watch: Regex::new(
            r"^(?:(https?)://)?(?:(?:www|m)\.)?youtube\.com/watch.*v=([a-zA-Z0-9_-]+)",
        )
        .expect("static regex"),
        youtube_short: Regex::new(r"^(?:(https?)://)?(?:(?:www|m)\.)?youtu\.be/([a-zA-Z0-9_-]+)")
            .expect("static regex"),
        vimeo: Regex::new(r"^(?:(https?)://)?(?:www\.)?vimeo\.com/(\d+)").expect("static regex"),
    })
}

/// Turn a YouTube or Vimeo page URL into its embeddable player URL.
///
/// Other URLs pass through unchanged as long as they are http(s). Empty input
/// and non-web schemes are rejected.
pub fn normalize_video_url(url: &str) -> Result<String, EmbedError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(EmbedError::EmptyUrl);
    }

    let patterns = video_patterns();
    let youtube = patterns
        .youtube_watch
        .captures(url)
        .or_else(|| patterns.youtube_short.captures(url));
    if let Some(caps) = youtube {
        let scheme = caps.get(1).map(|m| m.as_str()).unwrap_or("https");
        let id = &caps[2];
        return Ok(format!("{scheme}://www.youtube.com/embed/{id}?showinfo=0"));
    }
    if let Some(caps) = patterns.vimeo.captures(url) {
        let scheme = caps.get(1).map(|m| m.as_str()).unwrap_or("https");
        let id = &caps[2];
        return Ok(format!("{scheme}://player.vimeo.com/video/{id}/"));
    }

    match scheme_of(url) {
        Some(scheme) if scheme == "http" || scheme == "https" => Ok(url.to_string()),
        Some(scheme) => Err(EmbedError::UnsupportedScheme(scheme)),
        None => Ok(format!("https://{url}")),
    }
}

/// Sanitize a link target. Relative URLs are kept, unknown protocols become
/// `about:blank`.
pub fn sanitize_link(url: &str) -> String {
    let url = url.trim();
    match scheme_of(url) {
        Some(scheme) if !LINK_PROTOCOLS.contains(&scheme.as_str()) => "about:blank".to_string(),
        _ => url.to_string(),
    }
}

/// Lowercased scheme, if the URL has one.
fn scheme_of(url: &str) -> Option<String> {
    let (scheme, _) = url.split_once(':')?;
    let valid = !scheme.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_watch_url() {
        assert_eq!(
            normalize_video_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").unwrap(),
            "https://www.youtube.com/embed/dQw4w9WgXcQ?showinfo=0"
        );
    }

    #[test]
    fn test_youtube_short_url_without_scheme() {
        assert_eq!(
            normalize_video_url("youtu.be/abc_DEF-1").unwrap(),
            "https://www.youtube.com/embed/abc_DEF-1?showinfo=0"
        );
    }

    #[test]
    fn test_vimeo_url() {
        assert_eq!(
            normalize_video_url("http://vimeo.com/76979871").unwrap(),
            "http://player.vimeo.com/video/76979871/"
        );
    }

    #[test]
    fn test_other_urls() {
        assert_eq!(
            normalize_video_url("https://example.com/v.mp4").unwrap(),
            "https://example.com/v.mp4"
        );
        assert!(matches!(normalize_video_url("  "), Err(EmbedError::EmptyUrl)));
        assert!(matches!(
            normalize_video_url("javascript:alert(1)"),
            Err(EmbedError::UnsupportedScheme(s)) if s == "javascript"
        ));
    }

    #[test]
    fn test_sanitize_link() {
        assert_eq!(sanitize_link("https://example.com/hanji"), "https://example.com/hanji");
        assert_eq!(sanitize_link("MAILTO:a@b.c"), "MAILTO:a@b.c");
        assert_eq!(sanitize_link("/relative/path"), "/relative/path");
        assert_eq!(sanitize_link("data:text/html,hi"), "about:blank");
    }
}
