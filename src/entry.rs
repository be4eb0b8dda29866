use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

/// Fields a catalog entry carries that the generator does not model itself.
/// Kept sorted so serialized output is stable.
pub type Extra = BTreeMap<String, Value>;

/// The two kinds of local media the scanner knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaClass {
    Audio,
    Video,
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav", "ogg", "opus", "flac"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "webm", "ogv", "mov"];

impl MediaClass {
    /// Lowercase extensions (without the dot) accepted for this class
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            MediaClass::Audio => AUDIO_EXTENSIONS,
            MediaClass::Video => VIDEO_EXTENSIONS,
        }
    }

    /// MIME type used when the extension is not in the lookup table
    pub fn default_mime(self) -> &'static str {
        match self {
            MediaClass::Audio => "audio/mpeg",
            MediaClass::Video => "video/mp4",
        }
    }

    pub fn accepts(self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaClass::Audio => write!(f, "audio"),
            MediaClass::Video => write!(f, "video"),
        }
    }
}

/// Video platforms an embed may point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Youtube,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" | "yt" | "youtube-nocookie" => Ok(Provider::Youtube),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Youtube => write!(f, "youtube"),
        }
    }
}

/// A catalog entry backed by a file under one of the scanned directories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEntry {
    pub title: String,
    pub src: String,
    #[serde(rename = "type", alias = "mimeType", alias = "mime")]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LocalEntry {
    /// Entry with only the fields a scan can infer
    pub fn new(title: String, src: String, mime_type: String) -> Self {
        LocalEntry {
            title,
            src,
            mime_type,
            poster: None,
            captions: None,
            subtitles: None,
            thumbnail: None,
            description: None,
            credit: None,
            width: None,
            height: None,
            duration: None,
            order: None,
            extra: Extra::new(),
        }
    }

    /// Whether `key` names a modeled field that already holds a value.
    /// Carried-forward `extra` values never shadow these.
    pub fn has_field(&self, key: &str) -> bool {
        match key {
            "kind" | "title" | "src" | "type" | "mimeType" | "mime" => true,
            "poster" => self.poster.is_some(),
            "captions" => self.captions.is_some(),
            "subtitles" => self.subtitles.is_some(),
            "thumbnail" => self.thumbnail.is_some(),
            "description" => self.description.is_some(),
            "credit" => self.credit.is_some(),
            "width" => self.width.is_some(),
            "height" => self.height.is_some(),
            "duration" => self.duration.is_some(),
            "order" => self.order.is_some(),
            _ => false,
        }
    }
}

/// A catalog entry pointing at externally hosted video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedEntry {
    pub title: String,
    pub provider: Provider,
    pub video_id: String,
    pub embed_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl EmbedEntry {
    /// Same as [`LocalEntry::has_field`] for embeds
    pub fn has_field(&self, key: &str) -> bool {
        match key {
            "kind" | "title" | "provider" | "videoId" | "embedUrl" => true,
            "thumbnail" => self.thumbnail.is_some(),
            "order" => self.order.is_some(),
            "description" => self.description.is_some(),
            "credit" => self.credit.is_some(),
            "duration" => self.duration.is_some(),
            _ => false,
        }
    }
}

/// One item of a persisted catalog, tagged by `kind` on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaEntry {
    Local(LocalEntry),
    Embed(EmbedEntry),
}

impl MediaEntry {
    /// Identity key used to match entries across runs: `src` for local
    /// files, `embedUrl` for embeds.
    pub fn key(&self) -> &str {
        match self {
            MediaEntry::Local(local) => &local.src,
            MediaEntry::Embed(embed) => &embed.embed_url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            MediaEntry::Local(local) => &local.title,
            MediaEntry::Embed(embed) => &embed.title,
        }
    }

    pub fn order(&self) -> Option<i64> {
        match self {
            MediaEntry::Local(local) => local.order,
            MediaEntry::Embed(embed) => embed.order,
        }
    }

    pub fn is_embed(&self) -> bool {
        matches!(self, MediaEntry::Embed(_))
    }

    /// Catalog ordering: embeds before locals, then explicit `order`
    /// (entries without one last), then title (see [`natural_cmp`]), then key.
    pub fn catalog_cmp(&self, other: &MediaEntry) -> Ordering {
        other
            .is_embed()
            .cmp(&self.is_embed())
            .then_with(|| match (self.order(), other.order()) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| natural_cmp(self.title(), other.title()))
            .then_with(|| self.key().cmp(other.key()))
    }
}

/// Compare ignoring case, with runs of digits compared by value so that
/// `Track 2` sorts before `Track 10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let a_digits = take_digits(&mut a_chars);
                let b_digits = take_digits(&mut b_chars);
                let a_value = a_digits.trim_start_matches('0');
                let b_value = b_digits.trim_start_matches('0');
                let ord = a_value
                    .len()
                    .cmp(&b_value.len())
                    .then_with(|| a_value.cmp(b_value))
                    .then_with(|| a_digits.len().cmp(&b_digits.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(title: &str, src: &str, order: Option<i64>) -> MediaEntry {
        let mut entry = LocalEntry::new(title.to_string(), src.to_string(), "video/mp4".to_string());
        entry.order = order;
        MediaEntry::Local(entry)
    }

    #[test]
    fn test_class_accepts_case_insensitive() {
        assert!(MediaClass::Audio.accepts("MP3"));
        assert!(MediaClass::Audio.accepts("flac"));
        assert!(!MediaClass::Audio.accepts("mp4"));
        assert!(MediaClass::Video.accepts("MoV"));
        assert!(!MediaClass::Video.accepts("ogg"));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("YouTube".parse::<Provider>(), Ok(Provider::Youtube));
        assert_eq!(" yt ".parse::<Provider>(), Ok(Provider::Youtube));
        assert!("vimeo".parse::<Provider>().is_err());
    }

    #[test]
    fn test_local_serializes_with_kind_and_type() {
        let entry = local("Song One", "/audio/song-one.mp3", None);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"local","title":"Song One","src":"/audio/song-one.mp3","type":"video/mp4"}"#
        );
    }

    #[test]
    fn test_local_reads_mime_aliases_and_keeps_unknown_fields() {
        let json = r#"{"kind":"local","title":"A","src":"/audio/a.mp3","mimeType":"audio/mpeg","artist":"Someone"}"#;
        let entry: MediaEntry = serde_json::from_str(json).unwrap();
        match entry {
            MediaEntry::Local(local) => {
                assert_eq!(local.mime_type, "audio/mpeg");
                assert_eq!(local.extra.get("artist"), Some(&Value::from("Someone")));
                assert!(!local.extra.contains_key("kind"));
            }
            MediaEntry::Embed(_) => panic!("expected a local entry"),
        }
    }

    #[test]
    fn test_order_dominates_title() {
        let ordered = local("Zebra", "/videos/z.mp4", Some(1));
        let plain = local("Alpha", "/videos/a.mp4", None);
        assert_eq!(ordered.catalog_cmp(&plain), Ordering::Less);
    }

    #[test]
    fn test_natural_cmp_orders_numbers_by_value() {
        assert_eq!(natural_cmp("Track 2", "Track 10"), Ordering::Less);
        assert_eq!(natural_cmp("track 10", "Track 9"), Ordering::Greater);
        assert_eq!(natural_cmp("Take 007", "take 7"), Ordering::Greater);
        assert_eq!(natural_cmp("ALPHA", "alpha"), Ordering::Equal);
        assert_eq!(natural_cmp("Set", "Set 1"), Ordering::Less);
    }

    #[test]
    fn test_numbered_titles_sort_naturally() {
        let mut entries = vec![
            local("Track 10", "/audio/t10.mp3", None),
            local("Track 2", "/audio/t2.mp3", None),
            local("Track 1", "/audio/t1.mp3", None),
        ];
        entries.sort_by(|a, b| a.catalog_cmp(b));
        let titles: Vec<&str> = entries.iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["Track 1", "Track 2", "Track 10"]);
    }

    #[test]
    fn test_has_field() {
        let mut entry = LocalEntry::new("A".to_string(), "/a.mp3".to_string(), "audio/mpeg".to_string());
        assert!(entry.has_field("title"));
        assert!(!entry.has_field("duration"));
        entry.duration = Some("3:00".to_string());
        assert!(entry.has_field("duration"));
        assert!(!entry.has_field("artist"));
    }

    #[test]
    fn test_title_ordering_ignores_case() {
        let lower = local("alpha", "/videos/a.mp4", None);
        let upper = local("Beta", "/videos/b.mp4", None);
        assert_eq!(lower.catalog_cmp(&upper), Ordering::Less);
    }
}
