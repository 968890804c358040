//! Durable storage for snapshots, ownership, prestiges and session reports.
//!
//! This module provides:
//! - The `Persistence` trait the tracker and dispatcher write through
//! - `JsonStore`, a single JSON file rewritten whole on every change

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scan::Ownership;
use crate::stats::snapshot::StatisticsSnapshot;
use crate::stats::tracker::{PrestigeRecord, SessionReport};

/// Which statistics a snapshot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatGroup {
    /// Read off the game's stats panel
    Game,
    /// Counted by the bot itself
    Bot,
}

/// Storage collaborator. Writes are idempotent: repeating one after a
/// failure leaves the same state.
pub trait Persistence {
    fn load_snapshot(&self, group: StatGroup) -> Result<Option<StatisticsSnapshot>>;
    fn persist_snapshot(&mut self, group: StatGroup, snapshot: &StatisticsSnapshot) -> Result<()>;
    fn load_ownership(&self) -> Result<Ownership>;
    /// Owned entries stay owned; `owned = false` only registers unknown names.
    fn persist_ownership(&mut self, name: &str, owned: bool) -> Result<()>;
    fn persist_prestige(&mut self, record: &PrestigeRecord) -> Result<()>;
    fn persist_session(&mut self, report: &SessionReport) -> Result<()>;
}

impl<T: Persistence + ?Sized> Persistence for &mut T {
    fn load_snapshot(&self, group: StatGroup) -> Result<Option<StatisticsSnapshot>> {
        (**self).load_snapshot(group)
    }

    fn persist_snapshot(&mut self, group: StatGroup, snapshot: &StatisticsSnapshot) -> Result<()> {
        (**self).persist_snapshot(group, snapshot)
    }

    fn load_ownership(&self) -> Result<Ownership> {
        (**self).load_ownership()
    }

    fn persist_ownership(&mut self, name: &str, owned: bool) -> Result<()> {
        (**self).persist_ownership(name, owned)
    }

    fn persist_prestige(&mut self, record: &PrestigeRecord) -> Result<()> {
        (**self).persist_prestige(record)
    }

    fn persist_session(&mut self, report: &SessionReport) -> Result<()> {
        (**self).persist_session(report)
    }
}

/// On-disk layout of the statistics file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub game_statistics: Option<StatisticsSnapshot>,
    #[serde(default)]
    pub bot_statistics: Option<StatisticsSnapshot>,
    #[serde(default)]
    pub artifacts: Ownership,
    #[serde(default)]
    pub prestiges: Vec<PrestigeRecord>,
    /// Day ("%Y-%m-%d") -> session id -> report
    #[serde(default)]
    pub sessions: BTreeMap<String, BTreeMap<String, SessionReport>>,
}

/// JSON file store.
pub struct JsonStore {
    path: PathBuf,
    data: StoreData,
}

impl JsonStore {
    /// Opens `path`. A missing file starts empty; an unreadable or corrupt one
    /// is logged and also starts empty, and is replaced on the next write.
    pub fn open(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => {
                    info!("Loaded statistics from {}", path.display());
                    data
                }
                Err(e) => {
                    warn!(
                        "Statistics file {} is corrupt ({}), starting from an empty template",
                        path.display(),
                        e
                    );
                    StoreData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No statistics file at {}, starting fresh", path.display());
                StoreData::default()
            }
            Err(e) => {
                warn!(
                    "Failed to read statistics file {}: {}, starting from an empty template",
                    path.display(),
                    e
                );
                StoreData::default()
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &StoreData {
        &self.data
    }

    /// Rewrites the whole file via a temp file and rename.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved statistics to {}", self.path.display());
        Ok(())
    }
}

impl Persistence for JsonStore {
    fn load_snapshot(&self, group: StatGroup) -> Result<Option<StatisticsSnapshot>> {
        Ok(match group {
            StatGroup::Game => self.data.game_statistics.clone(),
            StatGroup::Bot => self.data.bot_statistics.clone(),
        })
    }

    fn persist_snapshot(&mut self, group: StatGroup, snapshot: &StatisticsSnapshot) -> Result<()> {
        let slot = match group {
            StatGroup::Game => &mut self.data.game_statistics,
            StatGroup::Bot => &mut self.data.bot_statistics,
        };
        *slot = Some(snapshot.clone());
        self.save()
    }

    fn load_ownership(&self) -> Result<Ownership> {
        Ok(self.data.artifacts.clone())
    }

    fn persist_ownership(&mut self, name: &str, owned: bool) -> Result<()> {
        if owned {
            self.data.artifacts.mark_owned(name);
        } else if self.data.artifacts.is_owned(name) {
            warn!("Ignoring request to mark owned artifact {} as unowned", name);
            return Ok(());
        } else {
            self.data.artifacts.register(name);
        }
        self.save()
    }

    fn persist_prestige(&mut self, record: &PrestigeRecord) -> Result<()> {
        self.data.prestiges.push(record.clone());
        self.save()
    }

    fn persist_session(&mut self, report: &SessionReport) -> Result<()> {
        self.data
            .sessions
            .entry(report.session.day())
            .or_default()
            .insert(report.session.id.to_string(), report.clone());
        self.save()
    }
}
