//! Offline shape check for target URLs.

/// URL fragments that identify the YouTube page types this tool handles.
pub const KNOWN_URL_SHAPES: &[&str] = &[
    "youtube.com/watch?v=",
    "youtu.be/",
    "youtube.com/embed/",
    "music.youtube.com/",
    "youtube.com/playlist?list=",
];

/// Accepts the identifier when it contains one of [`KNOWN_URL_SHAPES`]. No
/// network access happens here.
pub fn is_supported_url(target: &str) -> bool {
    let target = target.trim();
    !target.is_empty() && KNOWN_URL_SHAPES.iter().any(|shape| target.contains(shape))
}
