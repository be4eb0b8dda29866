use std::collections::{HashMap, HashSet};

use crate::entry::{EmbedEntry, Extra, LocalEntry, MediaEntry};

/// Combine this run's scan and declarations with the previous catalog.
///
/// Values the scan or declaration supplies always win. Curator fields the
/// generator cannot infer are copied from the previous entry with the same
/// identity key when the fresh entry lacks them. Previous entries with no
/// fresh counterpart are dropped. The result is sorted with
/// [`MediaEntry::catalog_cmp`].
pub fn merge(
    fresh_locals: Vec<LocalEntry>,
    declared_embeds: Vec<EmbedEntry>,
    previous: &[MediaEntry],
) -> Vec<MediaEntry> {
    let mut prev_locals: HashMap<&str, &LocalEntry> = HashMap::new();
    let mut prev_embeds: HashMap<&str, &EmbedEntry> = HashMap::new();
    for entry in previous {
        match entry {
            MediaEntry::Local(local) => {
                prev_locals.entry(local.src.as_str()).or_insert(local);
            }
            MediaEntry::Embed(embed) => {
                prev_embeds.entry(embed.embed_url.as_str()).or_insert(embed);
            }
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(fresh_locals.len() + declared_embeds.len());

    for mut embed in declared_embeds {
        if !seen.insert(embed.embed_url.clone()) {
            log::warn!("Duplicate embed {} ignored", embed.embed_url);
            continue;
        }
        if let Some(prev) = prev_embeds.get(embed.embed_url.as_str()) {
            carry_forward_embed(&mut embed, prev);
        }
        merged.push(MediaEntry::Embed(embed));
    }

    for mut local in fresh_locals {
        if !seen.insert(local.src.clone()) {
            log::warn!("Duplicate entry for {} ignored", local.src);
            continue;
        }
        if let Some(prev) = prev_locals.get(local.src.as_str()) {
            carry_forward_local(&mut local, prev);
        }
        merged.push(MediaEntry::Local(local));
    }

    merged.sort_by(|a, b| a.catalog_cmp(b));
    merged
}

fn fill<T: Clone>(field: &mut Option<T>, previous: &Option<T>) {
    if field.is_none() {
        field.clone_from(previous);
    }
}

/// Copy previous `extra` values the fresh entry lacks. A value stored there
/// under a modeled field's name (one that did not fit the field's type when
/// read back) only comes along while the fresh entry leaves that field empty.
fn fill_extra(extra: &mut Extra, previous: &Extra, has_field: impl Fn(&str) -> bool) {
    for (key, value) in previous {
        if has_field(key.as_str()) {
            continue;
        }
        extra.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

fn carry_forward_local(fresh: &mut LocalEntry, prev: &LocalEntry) {
    fill(&mut fresh.poster, &prev.poster);
    fill(&mut fresh.captions, &prev.captions);
    fill(&mut fresh.subtitles, &prev.subtitles);
    fill(&mut fresh.thumbnail, &prev.thumbnail);
    fill(&mut fresh.description, &prev.description);
    fill(&mut fresh.credit, &prev.credit);
    fill(&mut fresh.width, &prev.width);
    fill(&mut fresh.height, &prev.height);
    fill(&mut fresh.duration, &prev.duration);
    fill(&mut fresh.order, &prev.order);
    let mut extra = std::mem::take(&mut fresh.extra);
    fill_extra(&mut extra, &prev.extra, |key| fresh.has_field(key));
    fresh.extra = extra;
}

fn carry_forward_embed(fresh: &mut EmbedEntry, prev: &EmbedEntry) {
    fill(&mut fresh.thumbnail, &prev.thumbnail);
    fill(&mut fresh.order, &prev.order);
    fill(&mut fresh.description, &prev.description);
    fill(&mut fresh.credit, &prev.credit);
    fill(&mut fresh.duration, &prev.duration);
    let mut extra = std::mem::take(&mut fresh.extra);
    fill_extra(&mut extra, &prev.extra, |key| fresh.has_field(key));
    fresh.extra = extra;
}
