//! Parallel catalog search over collected pages.
//!
//! One worker thread per page. Workers share a found-set so an entry found on
//! one page is not searched for again elsewhere; two workers can still race
//! on the same entry, which the set union absorbs.

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use super::matcher::Matcher;
use crate::store::Persistence;

/// A named reference image.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub name: String,
    pub image: GrayImage,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, image: GrayImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }
}

/// Loads every PNG in `dir` as a catalog entry named after its file stem.
pub fn load_catalog(dir: &Path) -> Result<Vec<CatalogEntry>> {
    let mut entries = Vec::new();
    let listing = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read catalog directory {}", dir.display()))?;

    for entry in listing {
        let path = entry?.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Catalog file name is not valid UTF-8: {}", path.display()))?
            .to_string();
        let image = image::open(&path)
            .with_context(|| format!("Failed to load catalog image {}", path.display()))?
            .to_luma8();
        entries.push(CatalogEntry::new(name, image));
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    info!("Loaded {} catalog entries from {}", entries.len(), dir.display());
    Ok(entries)
}

/// Owned flag per catalog entry. Entries only ever go from unowned to owned.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ownership {
    entries: BTreeMap<String, bool>,
}

impl Ownership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_owned(&self, name: &str) -> bool {
        self.entries.get(name).copied().unwrap_or(false)
    }

    /// Marks `name` owned. Returns true if it was not owned before.
    pub fn mark_owned(&mut self, name: &str) -> bool {
        let slot = self.entries.entry(name.to_string()).or_insert(false);
        let newly = !*slot;
        *slot = true;
        newly
    }

    /// Records `name` as known but unowned, unless it is already owned.
    pub fn register(&mut self, name: &str) {
        self.entries.entry(name.to_string()).or_insert(false);
    }

    pub fn owned(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, owned)| **owned)
            .map(|(name, _)| name.as_str())
    }

    pub fn owned_count(&self) -> usize {
        self.entries.values().filter(|owned| **owned).count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked worker leaves the set usable
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Searches every page for every unowned catalog entry.
///
/// Returns the union of names found on any page. Does not return until all
/// workers have finished. A worker that panics loses only its own page.
pub fn match_catalog<M: Matcher>(
    pages: &[GrayImage],
    catalog: &[CatalogEntry],
    ownership: &Ownership,
    matcher: &M,
) -> Result<BTreeSet<String>> {
    let wanted: Vec<&CatalogEntry> = catalog
        .iter()
        .filter(|entry| !ownership.is_owned(&entry.name))
        .collect();

    if wanted.is_empty() || pages.is_empty() {
        debug!("Nothing to match: {} pages, {} unowned entries", pages.len(), wanted.len());
        return Ok(BTreeSet::new());
    }

    info!(
        "Matching {} unowned entries across {} pages",
        wanted.len(),
        pages.len()
    );

    let found: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

    thread::scope(|scope| -> Result<()> {
        let mut workers = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            let wanted = &wanted;
            let found = &found;
            let handle = thread::Builder::new()
                .name(format!("match-page-{}", index + 1))
                .spawn_scoped(scope, move || {
                    let mut local: Vec<String> = Vec::new();
                    for entry in wanted {
                        if lock(found).contains(&entry.name) {
                            continue;
                        }
                        if matcher.contains(page, &entry.image) {
                            debug!("Page {}: found {}", index + 1, entry.name);
                            lock(found).insert(entry.name.clone());
                            local.push(entry.name.clone());
                        }
                    }
                    local
                })
                .with_context(|| format!("Failed to start worker for page {}", index + 1))?;
            workers.push(handle);
        }

        for (index, worker) in workers.into_iter().enumerate() {
            match worker.join() {
                Ok(local) => info!("Page {}: {} matches", index + 1, local.len()),
                Err(e) => error!("Match worker for page {} panicked: {:?}", index + 1, e),
            }
        }
        Ok(())
    })?;

    Ok(found.into_inner().unwrap_or_else(PoisonError::into_inner))
}

/// Marks every found entry owned and persists the newly owned ones.
///
/// Returns the names that changed from unowned to owned.
pub fn merge_ownership<P: Persistence + ?Sized>(
    found: &BTreeSet<String>,
    ownership: &mut Ownership,
    store: &mut P,
) -> Result<Vec<String>> {
    let mut newly_owned = Vec::new();
    for name in found {
        if ownership.mark_owned(name) {
            store.persist_ownership(name, true)?;
            newly_owned.push(name.clone());
        }
    }
    if !newly_owned.is_empty() {
        info!("Newly owned: {}", newly_owned.join(", "));
    }
    Ok(newly_owned)
}
