//! Normalization of hand-declared video embeds.
//!
//! A declaration may be a bare platform URL or an object naming the
//! provider, a URL, a video id, or some combination. Every accepted form
//! resolves to the same canonical privacy-enhanced embed URL; anything that
//! cannot be resolved unambiguously is rejected rather than guessed at.

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::entry::{EmbedEntry, Extra, Provider};

const YOUTUBE_EMBED_BASE: &str = "https://www.youtube-nocookie.com/embed/";
const YOUTUBE_EMBED_PARAMS: &str = "rel=0&modestbranding=1";
const YOUTUBE_ID_LEN: usize = 11;
const DEFAULT_TITLE: &str = "Video";

/// One item of the embed declarations file, as written by a curator
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDeclaration {
    Url(String),
    Detailed(EmbedDeclaration),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedDeclaration {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, alias = "embedUrl", alias = "href")]
    pub url: Option<String>,
    #[serde(default, alias = "id")]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub credit: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Why a declaration did not produce an embed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("declaration has neither a url nor a video id")]
    Empty,
    #[error("unsupported provider '{0}'")]
    UnsupportedProvider(String),
    #[error("'{0}' is not a valid URL")]
    InvalidUrl(String),
    #[error("unrecognized video URL '{0}'")]
    UnrecognizedUrl(String),
    #[error("'{0}' is not a valid video id")]
    InvalidVideoId(String),
    #[error("url names video '{from_url}' but videoId is '{declared}'")]
    ConflictingId { from_url: String, declared: String },
}

impl RawDeclaration {
    /// Short human-readable description for log messages
    pub fn describe(&self) -> String {
        match self {
            RawDeclaration::Url(url) => url.clone(),
            RawDeclaration::Detailed(decl) => decl
                .url
                .clone()
                .or_else(|| decl.video_id.clone())
                .or_else(|| decl.title.clone())
                .unwrap_or_else(|| "<empty declaration>".to_string()),
        }
    }
}

/// Validate a declaration and build its catalog entry
pub fn normalize(raw: RawDeclaration) -> Result<EmbedEntry, Rejection> {
    let decl = match raw {
        RawDeclaration::Url(url) => EmbedDeclaration {
            url: Some(url),
            ..EmbedDeclaration::default()
        },
        RawDeclaration::Detailed(decl) => decl,
    };

    let url = non_blank(decl.url.as_deref());
    let declared_id = non_blank(decl.video_id.as_deref());

    if url.is_none() && declared_id.is_none() {
        return Err(Rejection::Empty);
    }

    if let Some(name) = non_blank(decl.provider.as_deref()) {
        name.parse::<Provider>()
            .map_err(|_| Rejection::UnsupportedProvider(name.to_string()))?;
    }

    let from_url = url.map(parse_video_url).transpose()?;

    let (provider, video_id) = match (from_url, declared_id) {
        (Some((provider, from_url)), Some(declared)) => {
            if from_url != declared {
                return Err(Rejection::ConflictingId {
                    from_url,
                    declared: declared.to_string(),
                });
            }
            (provider, from_url)
        }
        (Some(parsed), None) => parsed,
        (None, Some(declared)) => {
            // A bare id only makes sense with a known provider; YouTube is the only one
            if !is_youtube_id(declared) {
                return Err(Rejection::InvalidVideoId(declared.to_string()));
            }
            (Provider::Youtube, declared.to_string())
        }
        (None, None) => return Err(Rejection::Empty),
    };

    let title = non_blank(decl.title.as_deref())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    Ok(EmbedEntry {
        title,
        provider,
        embed_url: canonical_embed_url(provider, &video_id),
        video_id,
        thumbnail: decl.thumbnail,
        order: decl.order,
        description: decl.description,
        credit: decl.credit,
        duration: decl.duration,
        extra: Extra::new(),
    })
}

/// Canonical embeddable URL for a video
pub fn canonical_embed_url(provider: Provider, video_id: &str) -> String {
    match provider {
        Provider::Youtube => format!("{}{}?{}", YOUTUBE_EMBED_BASE, video_id, YOUTUBE_EMBED_PARAMS),
    }
}

/// Identify the provider and video id of a platform URL
pub fn parse_video_url(raw: &str) -> Result<(Provider, String), Rejection> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme).map_err(|_| Rejection::InvalidUrl(raw.to_string()))?;

    let host = url
        .host_str()
        .ok_or_else(|| Rejection::InvalidUrl(raw.to_string()))?
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    match host {
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtube-nocookie.com"
        | "youtu.be" => {}
        other => return Err(Rejection::UnsupportedProvider(other.to_string())),
    }

    let id = parse_youtube_id(&url).ok_or_else(|| Rejection::UnrecognizedUrl(raw.to_string()))?;
    if !is_youtube_id(&id) {
        return Err(Rejection::InvalidVideoId(id));
    }
    Ok((Provider::Youtube, id))
}

/// Extract the id from the accepted YouTube URL shapes:
/// `/watch?v=ID`, `youtu.be/ID`, `/embed/ID` and `/shorts/ID`.
pub fn parse_youtube_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if host.ends_with("youtu.be") {
        return match segments.as_slice() {
            [id] => Some(id.to_string()),
            _ => None,
        };
    }

    match segments.as_slice() {
        ["watch"] => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned()),
        ["embed", id] | ["shorts", id] => Some(id.to_string()),
        _ => None,
    }
}

fn is_youtube_id(id: &str) -> bool {
    id.len() == YOUTUBE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";
    const CANONICAL: &str = "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?rel=0&modestbranding=1";

    fn url(raw: &str) -> RawDeclaration {
        RawDeclaration::Url(raw.to_string())
    }

    #[test]
    fn test_accepted_shapes_normalize_identically() {
        let shapes = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?rel=0&modestbranding=1",
            "m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
        ];
        for shape in shapes {
            let entry = normalize(url(shape)).unwrap_or_else(|e| panic!("{}: {}", shape, e));
            assert_eq!(entry.video_id, ID, "{}", shape);
            assert_eq!(entry.embed_url, CANONICAL, "{}", shape);
            assert_eq!(entry.provider, Provider::Youtube);
        }
    }

    #[test]
    fn test_bare_video_id_with_provider() {
        let decl = EmbedDeclaration {
            provider: Some("YouTube".to_string()),
            video_id: Some(ID.to_string()),
            title: Some("Live at the Hall".to_string()),
            order: Some(2),
            ..EmbedDeclaration::default()
        };
        let entry = normalize(RawDeclaration::Detailed(decl)).unwrap();
        assert_eq!(entry.embed_url, CANONICAL);
        assert_eq!(entry.title, "Live at the Hall");
        assert_eq!(entry.order, Some(2));
    }

    #[test]
    fn test_default_title() {
        let entry = normalize(url("https://youtu.be/dQw4w9WgXcQ")).unwrap();
        assert_eq!(entry.title, "Video");
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            normalize(url("https://vimeo.com/123456")),
            Err(Rejection::UnsupportedProvider(_))
        ));
        assert!(matches!(
            normalize(url("https://www.youtube.com/channel/UC123")),
            Err(Rejection::UnrecognizedUrl(_))
        ));
        assert!(matches!(
            normalize(url("https://www.youtube.com/watch?v=short")),
            Err(Rejection::InvalidVideoId(_))
        ));
        assert!(matches!(
            normalize(url("https://youtu.be/")),
            Err(Rejection::UnrecognizedUrl(_))
        ));
        assert_eq!(
            normalize(RawDeclaration::Detailed(EmbedDeclaration::default())),
            Err(Rejection::Empty)
        );

        let vimeo = EmbedDeclaration {
            provider: Some("vimeo".to_string()),
            video_id: Some("123456".to_string()),
            ..EmbedDeclaration::default()
        };
        assert_eq!(
            normalize(RawDeclaration::Detailed(vimeo)),
            Err(Rejection::UnsupportedProvider("vimeo".to_string()))
        );
    }

    #[test]
    fn test_conflicting_id_is_rejected() {
        let decl = EmbedDeclaration {
            url: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
            video_id: Some("aaaaaaaaaaa".to_string()),
            ..EmbedDeclaration::default()
        };
        assert!(matches!(
            normalize(RawDeclaration::Detailed(decl)),
            Err(Rejection::ConflictingId { .. })
        ));
    }

    #[test]
    fn test_declaration_file_shapes_deserialize() {
        let json = r#"[
            "https://youtu.be/dQw4w9WgXcQ",
            {"embedUrl": "https://www.youtube.com/embed/dQw4w9WgXcQ", "title": "A"},
            {"provider": "youtube", "id": "dQw4w9WgXcQ", "order": 1}
        ]"#;
        let decls: Vec<RawDeclaration> = serde_json::from_str(json).unwrap();
        assert_eq!(decls.len(), 3);
        for decl in decls {
            assert_eq!(normalize(decl).unwrap().embed_url, CANONICAL);
        }
    }
}
