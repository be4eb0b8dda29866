use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::args::Config;
use crate::catalog::{self, WriteOutcome};
use crate::embed;
use crate::entry::{LocalEntry, MediaClass, MediaEntry};
use crate::filename;
use crate::merge::merge;
use crate::overrides::Overrides;
use crate::scanner;

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub audio_files: usize,
    pub video_files: usize,
    pub embeds: usize,
    pub rejected_embeds: usize,
    /// Local entries patched from the overrides file
    pub overridden: usize,
    /// Carried-forward posters and captions whose file is gone
    pub dropped_companions: usize,
    pub audio_written: Option<WriteOutcome>,
    pub videos_written: Option<WriteOutcome>,
}

impl ProcessingStats {
    pub fn total(&self) -> usize {
        self.audio_files + self.video_files + self.embeds
    }

    pub fn locals(&self) -> usize {
        self.audio_files + self.video_files
    }
}

/// Both catalogs built by one run
#[derive(Debug, Clone, PartialEq)]
pub struct Catalogs {
    pub audio: Vec<MediaEntry>,
    pub videos: Vec<MediaEntry>,
}

pub struct Processor {
    config: Config,
    stats: ProcessingStats,
}

impl Processor {
    pub fn new(config: Config) -> Self {
        Processor {
            config,
            stats: ProcessingStats::default(),
        }
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Scan, merge and write both catalogs
    pub fn run(&mut self) -> Result<&ProcessingStats> {
        log::info!("Generating catalogs in {}", self.config.out_dir.display());

        if !self.config.dry_run {
            fs::create_dir_all(&self.config.out_dir).with_context(|| {
                format!("Failed to create output directory: {}", self.config.out_dir.display())
            })?;
        }

        let catalogs = self.build()?;

        if self.config.dry_run {
            log::info!("Dry run, not writing catalogs");
        } else {
            let audio_path = self.config.audio_catalog();
            let video_path = self.config.video_catalog();
            self.stats.audio_written = Some(
                catalog::write_catalog(&catalogs.audio, &audio_path)
                    .context("Writing audio catalog")?,
            );
            self.stats.videos_written = Some(
                catalog::write_catalog(&catalogs.videos, &video_path)
                    .context("Writing video catalog")?,
            );
        }

        self.print_summary();
        Ok(&self.stats)
    }

    /// Everything up to, but not including, writing
    pub fn build(&mut self) -> Result<Catalogs> {
        let audio_files = scanner::scan(&self.config.audio_root, MediaClass::Audio)
            .context("Scanning audio directory")?;
        log::info!("Found {} audio file(s) in {}", audio_files.len(), self.config.audio_root.display());

        let video_files = scanner::scan(&self.config.video_root, MediaClass::Video)
            .context("Scanning video directory")?;
        log::info!("Found {} video file(s) in {}", video_files.len(), self.config.video_root.display());

        let previous_audio = catalog::read_previous(&self.config.audio_catalog());
        let previous_videos = catalog::read_previous(&self.config.video_catalog());
        let declarations = catalog::read_declarations(&self.config.embeds_file);

        let overrides = Overrides::read(&self.config.overrides_file);
        if !overrides.is_empty() {
            log::info!("Loaded {} override(s) from {}", overrides.len(), self.config.overrides_file.display());
        }

        self.stats.overridden = 0;
        let mut used = BTreeSet::new();
        let mut audio_locals = Vec::with_capacity(audio_files.len());
        for rel in &audio_files {
            audio_locals.push(self.derive_local(rel, MediaClass::Audio, &overrides, &mut used));
        }
        let mut video_locals = Vec::with_capacity(video_files.len());
        for rel in &video_files {
            video_locals.push(self.derive_local(rel, MediaClass::Video, &overrides, &mut used));
        }
        for key in overrides.keys().filter(|key| !used.contains(key)) {
            log::warn!("Override {:?} does not match any scanned file", key);
        }

        let mut embeds = Vec::with_capacity(declarations.len());
        let mut rejected = 0;
        for decl in declarations {
            let label = decl.describe();
            match embed::normalize(decl) {
                Ok(entry) => embeds.push(entry),
                Err(reason) => {
                    rejected += 1;
                    log::warn!("Dropping embed {}: {}", label, reason);
                }
            }
        }

        let mut audio = merge(audio_locals, Vec::new(), &previous_audio);
        let mut videos = merge(video_locals, embeds, &previous_videos);
        self.stats.dropped_companions = self.drop_missing_companions(&mut audio, MediaClass::Audio)
            + self.drop_missing_companions(&mut videos, MediaClass::Video);

        self.stats.audio_files = audio.len();
        self.stats.embeds = videos.iter().filter(|e| e.is_embed()).count();
        self.stats.video_files = videos.len() - self.stats.embeds;
        self.stats.rejected_embeds = rejected;

        Ok(Catalogs { audio, videos })
    }

    fn class_dirs(&self, class: MediaClass) -> (&Path, &str) {
        match class {
            MediaClass::Audio => (self.config.audio_root.as_path(), self.config.audio_url_base.as_str()),
            MediaClass::Video => (self.config.video_root.as_path(), self.config.video_url_base.as_str()),
        }
    }

    fn derive_local<'o>(
        &mut self,
        rel: &str,
        class: MediaClass,
        overrides: &'o Overrides,
        used: &mut BTreeSet<&'o str>,
    ) -> LocalEntry {
        let (root, url_base) = self.class_dirs(class);

        let mut entry = filename::derive(rel, class, url_base);
        if class == MediaClass::Video {
            entry.poster = companion_src(root, url_base, scanner::find_poster(root, rel));
        }
        entry.captions = companion_src(root, url_base, scanner::find_captions(root, rel));

        let matched = overrides.apply(&mut entry, class, url_base, rel);
        if !matched.is_empty() {
            self.stats.overridden += 1;
            used.extend(matched);
        }
        entry
    }

    /// Posters and captions carried forward from the previous catalog point
    /// at files that may have been deleted since. Drop the ones served from
    /// this class's directory that no longer exist.
    fn drop_missing_companions(&self, entries: &mut [MediaEntry], class: MediaClass) -> usize {
        let (root, url_base) = self.class_dirs(class);
        let mut dropped = 0;

        for entry in entries.iter_mut() {
            let MediaEntry::Local(local) = entry else {
                continue;
            };
            for field in [&mut local.poster, &mut local.captions] {
                let missing = field
                    .as_deref()
                    .is_some_and(|src| !scanner::companion_exists(root, url_base, src));
                if missing {
                    if let Some(src) = field.take() {
                        log::info!("Dropping {} from {}: file no longer exists", src, local.src);
                    }
                    dropped += 1;
                }
            }
        }
        dropped
    }

    fn print_summary(&self) {
        let stats = &self.stats;

        println!();
        println!("=== CATALOGS {} ===", if self.config.dry_run { "BUILT (DRY RUN)" } else { "GENERATED" });
        println!("Total entries: {}", stats.total());
        println!("  - Embeds: {}", stats.embeds);
        println!("  - Local files: {}", stats.locals());
        println!(
            "{}: {} item(s){}",
            self.config.audio_catalog().display(),
            stats.audio_files,
            outcome_note(stats.audio_written)
        );
        println!(
            "{}: {} item(s): {} embed(s), {} local{}",
            self.config.video_catalog().display(),
            stats.embeds + stats.video_files,
            stats.embeds,
            stats.video_files,
            outcome_note(stats.videos_written)
        );

        if stats.overridden > 0 {
            println!("Entries patched by overrides: {}", stats.overridden);
        }
        if stats.dropped_companions > 0 {
            println!("Missing posters/captions dropped: {}", stats.dropped_companions);
        }
        if stats.rejected_embeds > 0 {
            println!("Rejected embed declarations: {}", stats.rejected_embeds);
        }
    }
}

fn companion_src(root: &Path, url_base: &str, rel: Option<String>) -> Option<String> {
    let rel = rel?;
    log::debug!("Found companion file {}", root.join(&rel).display());
    Some(filename::public_src(url_base, &rel))
}

fn outcome_note(outcome: Option<WriteOutcome>) -> &'static str {
    match outcome {
        Some(WriteOutcome::Unchanged) => " (unchanged)",
        _ => "",
    }
}
