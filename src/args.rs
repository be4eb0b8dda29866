use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

use crate::overrides::OVERRIDES_FILE;

pub const AUDIO_CATALOG: &str = "audio.json";
pub const VIDEO_CATALOG: &str = "videos.json";
pub const EMBEDS_FILE: &str = "embeds.json";

/// Generate the site's audio and video catalogs from local media files
/// and curated embeds.
#[derive(Debug, Parser)]
#[command(name = "media-catalog", version, long_about = None)]
pub struct Args {
    /// Project root; other paths are resolved against it
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory served as the site root
    #[arg(long, default_value = "public")]
    pub public: PathBuf,

    /// Audio directory, relative to the public directory
    #[arg(long, default_value = "audio")]
    pub audio_dir: String,

    /// Video directory, relative to the public directory
    #[arg(long, default_value = "videos")]
    pub video_dir: String,

    /// Catalog output directory, relative to the public directory
    #[arg(long, default_value = "site-data")]
    pub out_dir: PathBuf,

    /// Embed declarations file (default: <out-dir>/embeds.json)
    #[arg(long)]
    pub embeds: Option<PathBuf>,

    /// Per-file overrides (default: <out-dir>/media-overrides.json)
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    /// Build the catalogs and print the summary without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Log filter implied by `-v`/`-q`; `RUST_LOG` still takes precedence
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Resolved paths for one generator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub audio_root: PathBuf,
    pub video_root: PathBuf,
    /// URL path segment(s) under which audio files are served
    pub audio_url_base: String,
    pub video_url_base: String,
    pub out_dir: PathBuf,
    pub embeds_file: PathBuf,
    pub overrides_file: PathBuf,
    pub dry_run: bool,
}

impl Config {
    /// Config with the default layout under `root`
    pub fn for_root(root: &Path) -> Self {
        let public = root.join("public");
        let out_dir = public.join("site-data");
        Config {
            audio_root: public.join("audio"),
            video_root: public.join("videos"),
            audio_url_base: "audio".to_string(),
            video_url_base: "videos".to_string(),
            embeds_file: out_dir.join(EMBEDS_FILE),
            overrides_file: out_dir.join(OVERRIDES_FILE),
            out_dir,
            dry_run: false,
        }
    }

    pub fn audio_catalog(&self) -> PathBuf {
        self.out_dir.join(AUDIO_CATALOG)
    }

    pub fn video_catalog(&self) -> PathBuf {
        self.out_dir.join(VIDEO_CATALOG)
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        let public = args.root.join(&args.public);
        let out_dir = public.join(&args.out_dir);
        let embeds_file = match &args.embeds {
            Some(path) => args.root.join(path),
            None => out_dir.join(EMBEDS_FILE),
        };
        let overrides_file = match &args.overrides {
            Some(path) => args.root.join(path),
            None => out_dir.join(OVERRIDES_FILE),
        };

        Config {
            audio_root: public.join(&args.audio_dir),
            video_root: public.join(&args.video_dir),
            audio_url_base: url_base(&args.audio_dir),
            video_url_base: url_base(&args.video_dir),
            out_dir,
            embeds_file,
            overrides_file,
            dry_run: args.dry_run,
        }
    }
}

/// `./media\audio/` -> `media/audio`
fn url_base(dir: &str) -> String {
    dir.split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}
