use std::path::Path;
use walkdir::WalkDir;

use crate::entry::MediaClass;
use crate::error::{CatalogError, Result};
use crate::filename;

const POSTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
const POSTER_DIR: &str = "posters";
const CAPTIONS_EXTENSION: &str = "vtt";

/// Recursively list media files of `class` under `base_dir`.
///
/// Returns `/`-separated paths relative to `base_dir`, sorted. A missing
/// `base_dir` is not an error: a fresh project simply has no media yet.
pub fn scan(base_dir: &Path, class: MediaClass) -> Result<Vec<String>> {
    if !base_dir.exists() {
        log::debug!("{} directory {} does not exist, nothing to scan", class, base_dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry_result in WalkDir::new(base_dir).min_depth(1).follow_links(true) {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) if err.depth() == 0 => {
                return Err(CatalogError::Scan {
                    path: base_dir.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                // Entries can vanish between listing and stat while media is being copied in
                if let Some(path) = err.path() {
                    log::warn!("Failed to access {}: {}", path.display(), err);
                } else {
                    log::warn!("WalkDir error: {}", err);
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let filename = entry.file_name().to_str().unwrap_or("");

        // Dotfiles, AppleDouble (._*) and .DS_Store
        if filename.is_empty() || filename.starts_with('.') {
            continue;
        }

        let accepted = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| class.accepts(ext));
        if !accepted {
            log::trace!("Skipping {}: not an {} file", entry.path().display(), class);
            continue;
        }

        match relative_path(base_dir, entry.path()) {
            Some(rel) => files.push(rel),
            None => log::warn!("Skipping non UTF-8 path {}", entry.path().display()),
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// `/`-joined path of `path` relative to `base`, regardless of host separator
fn relative_path(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Split a relative media path into its directory part and file stem
fn dir_and_stem(rel_path: &str) -> (&str, &str) {
    let (dir, filename) = rel_path.rsplit_once('/').unwrap_or(("", rel_path));
    let stem = match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    };
    (dir, stem)
}

fn join_rel(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Find an image sharing the video's stem, either beside the video or in
/// the `posters/` folder at the root of the video directory.
///
/// Returns the poster path relative to `base_dir`.
pub fn find_poster(base_dir: &Path, rel_path: &str) -> Option<String> {
    let (dir, stem) = dir_and_stem(rel_path);
    let search_dirs = [dir.to_string(), POSTER_DIR.to_string()];

    for search_dir in &search_dirs {
        for ext in POSTER_EXTENSIONS {
            let candidate = join_rel(search_dir, &format!("{}.{}", stem, ext));
            if base_dir.join(&candidate).is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Find a WebVTT captions file with the same stem next to the media file.
///
/// Returns the captions path relative to `base_dir`.
pub fn find_captions(base_dir: &Path, rel_path: &str) -> Option<String> {
    let (dir, stem) = dir_and_stem(rel_path);
    let candidate = join_rel(dir, &format!("{}.{}", stem, CAPTIONS_EXTENSION));
    base_dir.join(&candidate).is_file().then_some(candidate)
}

/// Whether the public URL `src` still resolves to a file in `base_dir`.
///
/// Only URLs served from `url_base` can be checked. Anything else (another
/// directory, another host) is assumed to exist.
pub fn companion_exists(base_dir: &Path, url_base: &str, src: &str) -> bool {
    if src.starts_with("//") {
        return true;
    }
    let prefix = filename::public_src(url_base, "");
    let rest = if prefix == "/" {
        src.strip_prefix('/')
    } else {
        src.strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    };
    let Some(rest) = rest else {
        return true;
    };

    let mut path = base_dir.to_path_buf();
    for segment in rest.split('/').filter(|s| !s.is_empty()) {
        match urlencoding::decode(segment) {
            Ok(decoded) if decoded != ".." => path.push(decoded.as_ref()),
            _ => return true,
        }
    }
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let files = scan(&tmp.path().join("nope"), MediaClass::Audio).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_scan_filters_sorts_and_recurses() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.mp3");
        touch(tmp.path(), "A.FLAC");
        touch(tmp.path(), "live/2024/encore.m4a");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "clip.mp4");
        touch(tmp.path(), "._b.mp3");
        touch(tmp.path(), ".DS_Store");

        let files = scan(tmp.path(), MediaClass::Audio).unwrap();
        assert_eq!(files, vec!["A.FLAC", "b.mp3", "live/2024/encore.m4a"]);
    }

    #[test]
    fn test_find_poster_beside_then_posters_dir() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "shows/gig.mp4");
        touch(tmp.path(), "posters/gig.png");
        assert_eq!(find_poster(tmp.path(), "shows/gig.mp4"), Some("posters/gig.png".to_string()));

        touch(tmp.path(), "shows/gig.jpg");
        assert_eq!(find_poster(tmp.path(), "shows/gig.mp4"), Some("shows/gig.jpg".to_string()));

        assert_eq!(find_poster(tmp.path(), "other.mp4"), None);
    }

    #[test]
    fn test_find_captions() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "talk.webm");
        touch(tmp.path(), "talk.vtt");
        assert_eq!(find_captions(tmp.path(), "talk.webm"), Some("talk.vtt".to_string()));
        assert_eq!(find_captions(tmp.path(), "other.webm"), None);
    }

    #[test]
    fn test_companion_exists_only_judges_own_urls() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "posters/first gig.webp");

        assert!(companion_exists(tmp.path(), "videos", "/videos/posters/first%20gig.webp"));
        assert!(!companion_exists(tmp.path(), "videos", "/videos/posters/gone.jpg"));
        assert!(!companion_exists(tmp.path(), "videos", "/videos/posters"));

        assert!(companion_exists(tmp.path(), "videos", "/images/gone.jpg"));
        assert!(companion_exists(tmp.path(), "videos", "/videosx/gone.jpg"));
        assert!(companion_exists(tmp.path(), "videos", "https://cdn.example.com/gone.jpg"));
        assert!(companion_exists(tmp.path(), "", "//cdn.example.com/gone.jpg"));
        assert!(!companion_exists(tmp.path(), "", "/gone.jpg"));
    }

    #[test]
    fn test_dir_and_stem() {
        assert_eq!(dir_and_stem("a/b/c.d.mp4"), ("a/b", "c.d"));
        assert_eq!(dir_and_stem("song.mp3"), ("", "song"));
    }
}
