//! Build-time generator for a static site's media catalogs.
//!
//! Scans the public audio and video directories, applies hand-written
//! per-file overrides, merges the result with curated embed declarations and
//! with the previous run's output, and writes `audio.json` / `videos.json`
//! for the site to render.

pub mod args;
pub mod catalog;
pub mod embed;
pub mod entry;
pub mod error;
pub mod filename;
pub mod merge;
pub mod overrides;
pub mod processor;
pub mod scanner;

pub use entry::{EmbedEntry, LocalEntry, MediaClass, MediaEntry, Provider};
pub use error::CatalogError;
pub use processor::{Catalogs, ProcessingStats, Processor};
