use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::embed::{self, RawDeclaration};
use crate::entry::{EmbedEntry, LocalEntry, MediaEntry};
use crate::error::{CatalogError, Result};

/// What `write_catalog` did with the destination file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Render a catalog exactly as it is stored on disk
pub fn render(entries: &[MediaEntry]) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(entries)?;
    json.push('\n');
    Ok(json)
}

/// Persist a catalog to `path`.
///
/// The file is written to a temporary sibling and renamed into place, so an
/// interrupted write leaves the previous catalog intact. A destination that
/// already holds identical bytes is left untouched.
pub fn write_catalog(entries: &[MediaEntry], path: &Path) -> Result<WriteOutcome> {
    let json = render(entries).map_err(|source| CatalogError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CatalogError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    if let Ok(existing) = fs::read(path) {
        if existing == json.as_bytes() {
            log::debug!("{} is up to date", path.display());
            return Ok(WriteOutcome::Unchanged);
        }
    }

    let tmp_path = temp_path_for(path);
    let result = write_then_rename(&tmp_path, path, json.as_bytes());
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result.map_err(|source| CatalogError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(WriteOutcome::Written)
}

fn write_then_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp_path, path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("catalog.json");
    path.with_file_name(format!(".{}.tmp", name))
}

/// Read the JSON document at `path`, treating a missing or unparsable file
/// as absent. Only a malformed file is worth a warning.
pub(crate) fn read_optional_json(path: &Path, what: &str) -> Option<Value> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No {} at {}", what, path.display());
            return None;
        }
        Err(e) => {
            log::warn!("Failed to read {} at {}: {}, starting from empty", what, path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring {} at {}: {}", what, path.display(), e);
            None
        }
    }
}

fn read_optional_array(path: &Path, what: &str) -> Vec<Value> {
    match read_optional_json(path, what) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            log::warn!("Ignoring {} at {}: expected a JSON array", what, path.display());
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Load the catalog written by a previous run.
///
/// Previous entries only feed carry-forward, so reading is lenient: a
/// missing `kind` is inferred from `embedUrl` / `src`, a missing title or
/// MIME type is left empty (the fresh scan supplies both), and a field whose
/// value does not fit its type is kept verbatim in `extra` rather than
/// costing the whole entry. Only items with no usable identity are skipped.
pub fn read_previous(path: &Path) -> Vec<MediaEntry> {
    read_optional_array(path, "previous catalog")
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match lenient_entry(item) {
            Ok(entry) => Some(entry),
            Err(reason) => {
                log::warn!("Skipping entry {} of {}: {}", index, path.display(), reason);
                None
            }
        })
        .collect()
}

/// JSON type a modeled field accepts
#[derive(Debug, Clone, Copy)]
enum Shape {
    Text,
    Count,
    Integer,
}

impl Shape {
    fn fits(self, value: &Value) -> bool {
        match self {
            Shape::Text => value.is_string(),
            Shape::Count => value.as_u64().is_some_and(|n| u32::try_from(n).is_ok()),
            Shape::Integer => value.as_i64().is_some(),
        }
    }
}

const LOCAL_OPTIONAL: &[(&str, Shape)] = &[
    ("poster", Shape::Text),
    ("captions", Shape::Text),
    ("subtitles", Shape::Text),
    ("thumbnail", Shape::Text),
    ("description", Shape::Text),
    ("credit", Shape::Text),
    ("width", Shape::Count),
    ("height", Shape::Count),
    ("duration", Shape::Text),
    ("order", Shape::Integer),
];

const EMBED_OPTIONAL: &[(&str, Shape)] = &[
    ("thumbnail", Shape::Text),
    ("order", Shape::Integer),
    ("description", Shape::Text),
    ("credit", Shape::Text),
    ("duration", Shape::Text),
];

const MIME_KEYS: &[&str] = &["type", "mimeType", "mime"];

type Map = serde_json::Map<String, Value>;

fn lenient_entry(item: Value) -> std::result::Result<MediaEntry, String> {
    let Value::Object(mut map) = item else {
        return Err("not an object".to_string());
    };

    let kind = match map.remove("kind") {
        Some(Value::String(kind)) => kind,
        Some(other) => return Err(format!("unknown kind {}", other)),
        None if map.contains_key("embedUrl") => "embed".to_string(),
        None if map.contains_key("src") => "local".to_string(),
        None => return Err("no src or embedUrl".to_string()),
    };

    match kind.as_str() {
        "local" => lenient_local(map).map(MediaEntry::Local),
        "embed" => lenient_embed(map).map(MediaEntry::Embed),
        other => Err(format!("unknown kind '{}'", other)),
    }
}

fn lenient_local(mut map: Map) -> std::result::Result<LocalEntry, String> {
    if !map.get("src").is_some_and(Value::is_string) {
        return Err("src is missing or not a string".to_string());
    }

    let mut stash = Map::new();

    // One MIME key survives; extra spellings are kept aside
    let mut mime = None;
    for key in MIME_KEYS {
        if let Some(value) = map.remove(*key) {
            if mime.is_none() && value.is_string() {
                mime = Some(value);
            } else if !value.is_null() {
                stash.insert(key.to_string(), value);
            }
        }
    }
    map.insert("type".to_string(), mime.unwrap_or_else(|| Value::from("")));

    require_text(&mut map, "title", &mut stash);
    set_aside_misfits(&mut map, LOCAL_OPTIONAL, &mut stash);

    let mut entry: LocalEntry =
        serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?;
    entry.extra.extend(stash);
    Ok(entry)
}

fn lenient_embed(mut map: Map) -> std::result::Result<EmbedEntry, String> {
    let embed_url = map
        .get("embedUrl")
        .and_then(Value::as_str)
        .ok_or_else(|| "embedUrl is not a string".to_string())?;

    // Declarations always produce canonical URLs, so an embed that does not
    // canonicalize can never be matched again
    let (provider, video_id) =
        embed::parse_video_url(embed_url).map_err(|e| format!("unusable embedUrl: {}", e))?;
    map.insert(
        "embedUrl".to_string(),
        Value::from(embed::canonical_embed_url(provider, &video_id)),
    );
    map.insert("provider".to_string(), Value::from(provider.to_string()));
    map.insert("videoId".to_string(), Value::from(video_id));

    // Older generators used `type: "embed"` as the marker
    if map.get("type").and_then(Value::as_str) == Some("embed") {
        map.remove("type");
    }

    let mut stash = Map::new();
    require_text(&mut map, "title", &mut stash);
    set_aside_misfits(&mut map, EMBED_OPTIONAL, &mut stash);

    let mut entry: EmbedEntry =
        serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?;
    entry.extra.extend(stash);
    Ok(entry)
}

/// Make sure `key` holds a string, moving any other non-null value aside
fn require_text(map: &mut Map, key: &str, stash: &mut Map) {
    if map.get(key).is_some_and(Value::is_string) {
        return;
    }
    if let Some(value) = map.remove(key).filter(|v| !v.is_null()) {
        stash.insert(key.to_string(), value);
    }
    map.insert(key.to_string(), Value::from(""));
}

fn set_aside_misfits(map: &mut Map, fields: &[(&str, Shape)], stash: &mut Map) {
    for (key, shape) in fields {
        let misfit = map
            .get(*key)
            .is_some_and(|value| !value.is_null() && !shape.fits(value));
        if misfit {
            if let Some(value) = map.remove(*key) {
                stash.insert(key.to_string(), value);
            }
        }
    }
}

/// Load the curator's embed declarations, one `RawDeclaration` per array item
pub fn read_declarations(path: &Path) -> Vec<RawDeclaration> {
    read_optional_array(path, "embed declarations")
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<RawDeclaration>(item) {
            Ok(decl) => Some(decl),
            Err(e) => {
                log::warn!("Skipping declaration {} of {}: {}", index, path.display(), e);
                None
            }
        })
        .collect()
}
