use crate::entry::{LocalEntry, MediaClass};

/// Extension to MIME type, shared by both media classes
const MIME_TABLE: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/opus"),
    ("flac", "audio/flac"),
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("webm", "video/webm"),
    ("ogv", "video/ogg"),
    ("mov", "video/quicktime"),
];

/// Build the catalog entry for a scanned file.
///
/// `url_base` is the class directory as served, e.g. `audio` or `videos`.
pub fn derive(rel_path: &str, class: MediaClass, url_base: &str) -> LocalEntry {
    let mime = get_extension(rel_path)
        .map(|ext| mime_for(&ext, class))
        .unwrap_or_else(|| class.default_mime());

    LocalEntry::new(
        title_from_path(rel_path),
        public_src(url_base, rel_path),
        mime.to_string(),
    )
}

/// Lowercased extension of the final path segment, if any
pub fn get_extension(rel_path: &str) -> Option<String> {
    let filename = rel_path.rsplit('/').next().unwrap_or(rel_path);
    match filename.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < filename.len() => {
            Some(filename[idx + 1..].to_ascii_lowercase())
        }
        _ => None,
    }
}

/// Look up the MIME type for an extension, falling back to the class default
pub fn mime_for(extension: &str, class: MediaClass) -> &'static str {
    MIME_TABLE
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
        .unwrap_or_else(|| class.default_mime())
}

/// Turn `our_favorite-songs.mp3` into `Our Favorite Songs`.
///
/// Best effort: acronyms and mixed case are not handled, curators override
/// titles where it matters.
pub fn title_from_path(rel_path: &str) -> String {
    let filename = rel_path.rsplit('/').next().unwrap_or(rel_path);
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };

    let title = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        stem.to_string()
    } else {
        title
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Site-relative URL for a file: `/<url_base>/<rel_path>` with each path
/// segment percent-encoded.
pub fn public_src(url_base: &str, rel_path: &str) -> String {
    let mut src = String::new();
    for segment in url_base
        .split('/')
        .chain(rel_path.split('/'))
        .filter(|s| !s.is_empty())
    {
        src.push('/');
        src.push_str(&urlencoding::encode(segment));
    }
    if src.is_empty() {
        src.push('/');
    }
    src
}
