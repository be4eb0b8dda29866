use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::catalog;
use crate::entry::{LocalEntry, MediaClass};

pub const OVERRIDES_FILE: &str = "media-overrides.json";

/// Fields an override can never change
const LOCKED_FIELDS: &[&str] = &["kind", "src"];

/// Hand-written patches for scanned files, read from `media-overrides.json`.
///
/// The file is a JSON object. Each key names one file and each value is an
/// object of fields to set on that file's entry:
///
/// ```json
/// {
///   "video-live/encore.webm": { "title": "Encore (Live)", "order": 1 },
///   "/audio/demo%20take.mp3": { "poster": "/images/demo.jpg" }
/// }
/// ```
///
/// A file can be named by its path relative to its media directory
/// (`live/encore.webm`), by `<class>-<path>` (`video-live/encore.webm`), by
/// its unencoded public path (`/videos/live/encore.webm`) or by its `src`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    patches: BTreeMap<String, Map<String, Value>>,
}

impl Overrides {
    /// Load overrides from `path`. A missing or malformed file means no
    /// overrides; a key whose value is not an object is skipped.
    pub fn read(path: &Path) -> Self {
        let items = match catalog::read_optional_json(path, "media overrides") {
            Some(Value::Object(items)) => items,
            Some(_) => {
                log::warn!("Ignoring media overrides at {}: expected a JSON object", path.display());
                return Overrides::default();
            }
            None => return Overrides::default(),
        };

        let mut patches = BTreeMap::new();
        for (key, value) in items {
            match value {
                Value::Object(patch) => {
                    patches.insert(key, patch);
                }
                other => log::warn!("Skipping override {:?} in {}: expected an object, got {}", key, path.display(), other),
            }
        }
        Overrides { patches }
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.patches.keys().map(String::as_str)
    }

    /// Patch a freshly derived entry with every override naming it.
    ///
    /// When several keys name the same file, the more specific one is
    /// applied last: relative path, then `<class>-<path>`, then public path,
    /// then `src`. Returns the keys that matched.
    pub fn apply(
        &self,
        entry: &mut LocalEntry,
        class: MediaClass,
        url_base: &str,
        rel_path: &str,
    ) -> Vec<&str> {
        if self.patches.is_empty() {
            return Vec::new();
        }

        let mut matched = Vec::new();
        for key in candidate_keys(&entry.src, class, url_base, rel_path) {
            if let Some((key, patch)) = self.patches.get_key_value(key.as_str()) {
                if matched.contains(&key.as_str()) {
                    continue;
                }
                log::debug!("Applying override {:?} to {}", key, entry.src);
                patch_entry(entry, key, patch);
                matched.push(key.as_str());
            }
        }
        matched
    }
}

fn candidate_keys(src: &str, class: MediaClass, url_base: &str, rel_path: &str) -> Vec<String> {
    let public_path = if url_base.is_empty() {
        format!("/{}", rel_path)
    } else {
        format!("/{}/{}", url_base, rel_path)
    };
    vec![
        rel_path.to_string(),
        format!("{}-{}", class, rel_path),
        public_path,
        src.to_string(),
    ]
}

/// Set each patched field that still leaves a valid entry; anything else is
/// reported and left as derived.
fn patch_entry(entry: &mut LocalEntry, key: &str, patch: &Map<String, Value>) {
    let mut fields = match serde_json::to_value(&*entry) {
        Ok(Value::Object(fields)) => fields,
        _ => return,
    };

    for (field, value) in patch {
        let field = match field.as_str() {
            "mime" | "mimeType" => "type",
            other => other,
        };
        if LOCKED_FIELDS.contains(&field) {
            log::warn!("Override {:?} cannot change {:?}", key, field);
            continue;
        }

        let previous = if value.is_null() {
            fields.remove(field)
        } else {
            fields.insert(field.to_string(), value.clone())
        };

        if let Err(e) = serde_json::from_value::<LocalEntry>(Value::Object(fields.clone())) {
            log::warn!("Ignoring override {:?} field {:?}: {}", key, field, e);
            match previous {
                Some(old) => {
                    fields.insert(field.to_string(), old);
                }
                None => {
                    fields.remove(field);
                }
            }
        }
    }

    match serde_json::from_value(Value::Object(fields)) {
        Ok(patched) => *entry = patched,
        Err(e) => log::warn!("Ignoring override {:?}: {}", key, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename;
    use std::fs;
    use tempfile::TempDir;

    fn overrides(json: &str) -> Overrides {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(OVERRIDES_FILE);
        fs::write(&path, json).unwrap();
        Overrides::read(&path)
    }

    fn derived(rel: &str, class: MediaClass, url_base: &str) -> LocalEntry {
        filename::derive(rel, class, url_base)
    }

    #[test]
    fn test_missing_and_malformed_files_are_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(Overrides::read(&tmp.path().join(OVERRIDES_FILE)).is_empty());
        assert!(overrides("{ nope").is_empty());
        assert!(overrides(r#"[{"title": "x"}]"#).is_empty());

        let mixed = overrides(r#"{"a.mp3": "Title", "b.mp3": {"title": "B"}}"#);
        assert_eq!(mixed.keys().collect::<Vec<_>>(), vec!["b.mp3"]);
    }

    #[test]
    fn test_every_key_form_names_the_file() {
        for key in [
            "live/first gig.mp4",
            "video-live/first gig.mp4",
            "/videos/live/first gig.mp4",
            "/videos/live/first%20gig.mp4",
        ] {
            let set = overrides(&format!(r#"{{"{}": {{"title": "Opening Night"}}}}"#, key));
            let mut entry = derived("live/first gig.mp4", MediaClass::Video, "videos");
            assert_eq!(set.apply(&mut entry, MediaClass::Video, "videos", "live/first gig.mp4"), vec![key]);
            assert_eq!(entry.title, "Opening Night", "{}", key);
        }

        let set = overrides(r#"{"audio-live/first gig.mp4": {"title": "Wrong"}}"#);
        let mut entry = derived("live/first gig.mp4", MediaClass::Video, "videos");
        assert!(set.apply(&mut entry, MediaClass::Video, "videos", "live/first gig.mp4").is_empty());
        assert_eq!(entry.title, "First Gig");
    }

    #[test]
    fn test_src_key_beats_filename_key() {
        let set = overrides(
            r#"{"/audio/demo.mp3": {"title": "From Src"}, "demo.mp3": {"title": "From Name", "order": 4}}"#,
        );
        let mut entry = derived("demo.mp3", MediaClass::Audio, "audio");
        let matched = set.apply(&mut entry, MediaClass::Audio, "audio", "demo.mp3");
        assert_eq!(matched, vec!["demo.mp3", "/audio/demo.mp3"]);
        assert_eq!(entry.title, "From Src");
        assert_eq!(entry.order, Some(4));
    }

    #[test]
    fn test_patch_sets_fields_and_keeps_src() {
        let set = overrides(
            r#"{"clip.m4v": {"mime": "video/x-m4v", "poster": "/images/clip.png",
                             "src": "/elsewhere.mp4", "kind": "embed", "artist": "Sam"}}"#,
        );
        let mut entry = derived("clip.m4v", MediaClass::Video, "videos");
        set.apply(&mut entry, MediaClass::Video, "videos", "clip.m4v");
        assert_eq!(entry.mime_type, "video/x-m4v");
        assert_eq!(entry.poster.as_deref(), Some("/images/clip.png"));
        assert_eq!(entry.src, "/videos/clip.m4v");
        assert_eq!(entry.extra.get("artist"), Some(&Value::from("Sam")));
    }

    #[test]
    fn test_invalid_values_are_ignored_field_by_field() {
        let set = overrides(
            r#"{"song.mp3": {"order": "first", "title": null, "width": -3, "description": "Acoustic"}}"#,
        );
        let mut entry = derived("song.mp3", MediaClass::Audio, "audio");
        set.apply(&mut entry, MediaClass::Audio, "audio", "song.mp3");
        assert_eq!(entry.title, "Song");
        assert_eq!(entry.order, None);
        assert_eq!(entry.width, None);
        assert_eq!(entry.description.as_deref(), Some("Acoustic"));
    }

    #[test]
    fn test_null_clears_a_derived_field() {
        let set = overrides(r#"{"clip.mp4": {"captions": null}}"#);
        let mut entry = derived("clip.mp4", MediaClass::Video, "videos");
        entry.captions = Some("/videos/clip.vtt".to_string());
        set.apply(&mut entry, MediaClass::Video, "videos", "clip.mp4");
        assert_eq!(entry.captions, None);
    }
}
