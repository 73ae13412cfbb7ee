//! Content-type guessing from file names.
//!
//! Upstream files often arrive without a MIME type; the extension of the
//! stored file name is the only hint left.

use std::path::Path;

/// Fallback content type when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

const KNOWN_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("ts", "video/mp2t"),
    ("m2ts", "video/mp2t"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
    ("m4a", "audio/mp4"),
    ("mp3", "audio/mpeg"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("srt", "application/x-subrip"),
    ("zip", "application/zip"),
    ("rar", "application/vnd.rar"),
];

/// Guess the MIME type from a file name's extension.
///
/// # Examples
///
/// ```
/// use reelstream_common::mime::guess_content_type;
///
/// assert_eq!(guess_content_type("Show.S01E01.mkv"), Some("video/x-matroska"));
/// assert_eq!(guess_content_type("README"), None);
/// ```
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_lowercase();
    KNOWN_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// File extension to use for a synthesized file name of the given MIME type.
///
/// Takes the MIME subtype, so `video/mp4` becomes `mp4`.
pub fn extension_for(mime_type: &str) -> &str {
    match mime_type.split_once('/') {
        Some((_, subtype)) if !subtype.is_empty() => subtype,
        _ => "unknown",
    }
}
