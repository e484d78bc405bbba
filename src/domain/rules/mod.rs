// Domain rules - URL policies, naming and error classification

use url::Url;

/// Canonical domain of the primary video platform
pub const PRIMARY_DOMAIN: &str = "youtube.com";

/// Companion domain substituted for the primary platform's domain
pub const MIRROR_DOMAIN: &str = "ssyoutube.com";

/// Bodies smaller than this are treated as failed downloads
pub const MIN_MEDIA_BYTES: usize = 1000;

/// Host fragments of platforms that never serve a media binary directly
const SOCIAL_PATTERNS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "facebook.com",
    "tiktok.com",
    "instagram.com",
    "x.com",
    "twitter.com",
    MIRROR_DOMAIN,
];

/// Extensions accepted as a real media file name when naming a download
const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".webm", ".mov"];

/// Extensions accepted for local input files
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "mov", "avi", "m4v", "flv", "wmv", "mpeg", "mpg", "ts", "3gp",
];

/// Whether the URL already carries the mirror-domain marker
pub fn has_mirror_marker(url: &str) -> bool {
    url.to_lowercase().contains(MIRROR_DOMAIN)
}

/// Rewrite the primary platform's host to its mirror form.
///
/// Idempotent: a URL that already carries the marker is returned unchanged,
/// as is anything that does not parse or is hosted elsewhere.
pub fn apply_mirror_rewrite(raw: &str) -> String {
    if has_mirror_marker(raw) {
        return raw.to_string();
    }
    replace_host_domain(raw, PRIMARY_DOMAIN, MIRROR_DOMAIN).unwrap_or_else(|| raw.to_string())
}

/// Undo the mirror rewrite, recovering the original-domain form
pub fn restore_original_domain(raw: &str) -> String {
    if !has_mirror_marker(raw) {
        return raw.to_string();
    }
    replace_host_domain(raw, MIRROR_DOMAIN, PRIMARY_DOMAIN).unwrap_or_else(|| raw.to_string())
}

fn replace_host_domain(raw: &str, from: &str, to: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_lowercase();
    if host != from && !host.ends_with(&format!(".{}", from)) {
        return None;
    }
    let new_host = format!("{}{}", &host[..host.len() - from.len()], to);
    url.set_host(Some(&new_host)).ok()?;
    Some(url.to_string())
}

/// Case-insensitive substring test against known social platforms.
///
/// Deliberately loose (`x.com` also matches unrelated hosts ending in it);
/// a false positive only costs one extraction call.
pub fn is_social_link(url: &str) -> bool {
    let lowered = url.to_lowercase();
    SOCIAL_PATTERNS.iter().any(|p| lowered.contains(p))
}

pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

pub fn is_video_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_lowercase().starts_with("video/"))
        .unwrap_or(false)
}

/// Name a downloaded video after its URL path, or synthesize a unique one
pub fn derive_media_filename(final_url: &str, now_millis: i64) -> String {
    let from_path = Url::parse(final_url).ok().and_then(|url| {
        url.path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });

    match from_path {
        Some(name)
            if MEDIA_EXTENSIONS
                .iter()
                .any(|ext| name.to_lowercase().ends_with(ext)) =>
        {
            name
        }
        _ => format!("video_{}.mp4", now_millis),
    }
}

pub fn is_video_filename(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Category hint for messages caused by a host security restriction
pub fn category_hint(message: &str) -> Option<&'static str> {
    let lowered = message.to_lowercase();
    if lowered.contains("sharedarraybuffer") {
        return Some("environment error: a required security feature is blocked");
    }
    if lowered.contains("cors") || lowered.contains("cross-origin") {
        return Some("cross-origin restriction: the server does not allow this content to be fetched");
    }
    if lowered.contains("permission denied") || lowered.contains("forbidden") {
        return Some("access restriction: check permissions for the source or destination");
    }
    None
}
