//! Session statistics: one tracker per bot run.
//!
//! The tracker owns the capture source, the field extractor and the store.
//! Each operation expects the matching game panel to already be on screen.

use anyhow::Result;
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use super::gear::{find_first_gear_of, first_hero_damage_type, DamageType, GearImages, GearLookup, HeroImages};
use super::props::Props;
use super::reconcile::{diff, diff_all, DeltaRecord};
use super::snapshot::{StatisticsSnapshot, TypedStatValue};
use crate::capture::{CaptureProvider, CaptureRegion, ScrollAction};
use crate::layout::{
    skill_level_spec, tournament_rank_spec, tournament_stage_spec, tournament_user_spec, FieldSpec, Layout,
};
use crate::logging;
use crate::ocr::{FieldExtractor, OcrEngine};
use crate::scan::{collect_pages, match_catalog, merge_ownership, CatalogEntry, Matcher, Ownership, ScanEnd, ScanOptions};
use crate::store::{Persistence, StatGroup};

/// Bot statistic counting collected ads.
pub const ADS_FIELD: &str = "ads";

/// One run of the bot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub version: String,
    pub started: DateTime<Local>,
    /// Log file mirroring this session's log lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Session {
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started: Local::now(),
            log_file: None,
        }
    }

    /// Day key the session is filed under.
    pub fn day(&self) -> String {
        self.started.format("%Y-%m-%d").to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrestigeRecord {
    pub timestamp: DateTime<Local>,
    /// Time since the previous prestige, if it could be read
    pub time: Option<Duration>,
    pub stage: Option<u64>,
    pub artifact: Option<String>,
    pub advance_start: Option<u64>,
    pub session: Uuid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: Session,
    pub generated: DateTime<Local>,
    pub game: BTreeMap<String, DeltaRecord>,
    pub bot: BTreeMap<String, DeltaRecord>,
}

impl SessionReport {
    pub fn new(
        session: Session,
        game: BTreeMap<String, DeltaRecord>,
        bot: BTreeMap<String, DeltaRecord>,
    ) -> Self {
        Self {
            session,
            generated: Local::now(),
            game,
            bot,
        }
    }
}

/// Result of one artifact scan.
#[derive(Clone, Debug)]
pub struct ArtifactScan {
    pub pages: usize,
    pub end: ScanEnd,
    pub found: BTreeSet<String>,
    pub newly_owned: Vec<String>,
}

pub struct StatsTracker<C, O, P> {
    layout: Layout,
    capture: C,
    extractor: FieldExtractor<O>,
    store: P,
    session: Session,
    /// Game stats when the session started
    session_start: StatisticsSnapshot,
    /// Game stats before the latest update
    baseline: StatisticsSnapshot,
    current: StatisticsSnapshot,
    bot_start: StatisticsSnapshot,
    bot_current: StatisticsSnapshot,
    ownership: Ownership,
    props: Props,
}

impl<C, O, P> StatsTracker<C, O, P>
where
    C: CaptureProvider,
    O: OcrEngine,
    P: Persistence,
{
    /// Starts a session, using the stored snapshots as the baseline.
    pub fn new(layout: Layout, capture: C, extractor: FieldExtractor<O>, store: P) -> Result<Self> {
        let current = store.load_snapshot(StatGroup::Game)?.unwrap_or_default();
        let bot_current = store.load_snapshot(StatGroup::Bot)?.unwrap_or_default();
        let ownership = store.load_ownership()?;
        let session = Session::start();

        info!(
            "Session {} started (version {}, {} stored stats, {} owned artifacts)",
            session.id,
            session.version,
            current.len(),
            ownership.owned_count()
        );

        Ok(Self {
            layout,
            capture,
            extractor,
            store,
            session,
            session_start: current.clone(),
            baseline: current.clone(),
            current,
            bot_start: bot_current.clone(),
            bot_current,
            ownership,
            props: Props::new(),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current(&self) -> &StatisticsSnapshot {
        &self.current
    }

    pub fn baseline(&self) -> &StatisticsSnapshot {
        &self.baseline
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut Props {
        &mut self.props
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    /// Mirrors log lines into `<logs_dir>/<session id>.log` until the
    /// session finishes. Returns the file path.
    pub fn attach_session_log(&mut self, logs_dir: &Path) -> PathBuf {
        let path = logs_dir.join(format!("{}.log", self.session.id));
        logging::set_session_log(Some(path.clone()));
        info!("Session {} logging to {}", self.session.id, path.display());
        self.session.log_file = Some(path.clone());
        path
    }

    fn read(&mut self, spec: &FieldSpec) -> Result<TypedStatValue> {
        self.extractor.extract_field(spec, &mut self.capture)
    }

    /// Reads the whole stats panel into a fresh snapshot and persists it.
    ///
    /// Unparsable fields are kept as such; only capture, OCR or storage
    /// failures end the update.
    pub fn update_stats(&mut self) -> Result<&StatisticsSnapshot> {
        let snapshot = self
            .extractor
            .extract_all(&self.layout.stats, &mut self.capture)?;

        let unparsable = snapshot.unparsable_count();
        if unparsable > 0 {
            warn!("{} of {} stats could not be parsed this cycle", unparsable, snapshot.len());
        }

        self.store.persist_snapshot(StatGroup::Game, &snapshot)?;
        self.baseline = std::mem::replace(&mut self.current, snapshot);
        info!("Statistics updated ({} fields)", self.current.len());
        Ok(&self.current)
    }

    /// Deltas between the last two updates, for the stats panel fields.
    pub fn deltas(&self) -> BTreeMap<String, DeltaRecord> {
        diff(&self.baseline, &self.current, self.layout.stat_names())
    }

    /// Highest stage from the latest update; `None` when it was not readable.
    pub fn highest_stage(&self) -> Option<u64> {
        let value = self.current.get("highest_stage_reached")?;
        let stage = value.as_u64();
        info!("Highest stage parsed: {} -> {:?}", value, stage);
        stage
    }

    /// Reads the stage counter at the top of the game screen.
    pub fn stage_ocr(&mut self) -> Result<TypedStatValue> {
        let spec = self.layout.stage.clone();
        let value = self.read(&spec)?;
        self.props.set_current_stage(value.as_u64());
        Ok(value)
    }

    /// Reads the advance start stage off the prestige panel.
    pub fn advance_start(&mut self) -> Result<TypedStatValue> {
        let spec = self.layout.advance_start.clone();
        let value = self.read(&spec)?;
        self.props.set_advance_start(value.as_u64());
        Ok(value)
    }

    /// Records a prestige from the pre-prestige panel.
    pub fn record_prestige(&mut self, artifact: Option<&str>, current_stage: Option<u64>) -> Result<PrestigeRecord> {
        let spec = self.layout.time_since_prestige.clone();
        let time = match self.read(&spec)? {
            TypedStatValue::Duration(d) if !d.is_zero() => Some(d),
            _ => None,
        };
        let advance_start = self.advance_start()?.as_u64();

        let record = PrestigeRecord {
            timestamp: Local::now(),
            time,
            stage: current_stage,
            artifact: artifact.map(str::to_string),
            advance_start,
            session: self.session.id,
        };

        self.store.persist_prestige(&record)?;
        self.props.set_last_prestige(record.timestamp);
        info!(
            "Prestige recorded: stage {:?}, time {:?}, artifact {:?}",
            record.stage, record.time, record.artifact
        );
        Ok(record)
    }

    /// When the clan raid attacks reset, read from the raid panel countdown.
    pub fn raid_attacks_reset(&mut self) -> Result<Option<DateTime<Local>>> {
        let spec = self.layout.raid_attack_reset.clone();
        let reset = match self.read(&spec)? {
            TypedStatValue::Duration(d) => chrono::Duration::from_std(d)
                .ok()
                .and_then(|delta| Local::now().checked_add_signed(delta)),
            _ => None,
        };
        self.props.set_next_raid_reset(reset);
        Ok(reset)
    }

    /// Level of the skill whose level text is at `region`.
    pub fn skill_level(&mut self, region: CaptureRegion) -> Result<TypedStatValue> {
        self.read(&skill_level_spec(region))
    }

    pub fn tournament_rank(&mut self, region: CaptureRegion, threshold: Option<u32>) -> Result<TypedStatValue> {
        self.read(&tournament_rank_spec(region, threshold))
    }

    pub fn tournament_user(&mut self, region: CaptureRegion) -> Result<TypedStatValue> {
        self.read(&tournament_user_spec(region))
    }

    pub fn tournament_stage(&mut self, region: CaptureRegion) -> Result<TypedStatValue> {
        self.read(&tournament_stage_spec(region))
    }

    /// Scrolls the artifacts panel, looks for unowned artifacts on every page
    /// and persists the newly owned ones.
    pub fn parse_artifacts<S, M>(
        &mut self,
        scroll: &mut S,
        catalog: &[CatalogEntry],
        matcher: &M,
        options: &ScanOptions,
    ) -> Result<ArtifactScan>
    where
        S: ScrollAction + ?Sized,
        M: Matcher,
    {
        for entry in catalog {
            self.ownership.register(&entry.name);
        }

        let region = self.layout.artifact_region;
        let pages = collect_pages(scroll, &mut self.capture, &region, options)?;
        let found = match_catalog(&pages.pages, catalog, &self.ownership, matcher)?;
        let newly_owned = merge_ownership(&found, &mut self.ownership, &mut self.store)?;

        info!(
            "Artifact scan: {} pages, {} found, {} newly owned",
            pages.len(),
            found.len(),
            newly_owned.len()
        );

        Ok(ArtifactScan {
            pages: pages.len(),
            end: pages.end,
            found,
            newly_owned,
        })
    }

    /// First locked gear piece of `kind` on the equipment panel.
    pub fn first_gear_of<M: Matcher>(&mut self, kind: DamageType, matcher: &M, images: &GearImages) -> Result<GearLookup> {
        find_first_gear_of(kind, &mut self.capture, matcher, &self.layout.gear_slots, images)
    }

    /// Damage type of the first levelled hero on the heroes panel.
    pub fn first_hero_damage_type<M: Matcher>(&mut self, matcher: &M, images: &HeroImages) -> Result<Option<DamageType>> {
        first_hero_damage_type(&mut self.capture, matcher, &self.layout.hero_slots, images)
    }

    /// Counts a collected ad and persists the bot statistics.
    pub fn increment_ads(&mut self) -> Result<u64> {
        self.props.increment_ads();
        let total = self
            .bot_current
            .get(ADS_FIELD)
            .and_then(TypedStatValue::as_u64)
            .unwrap_or(0)
            + 1;
        self.bot_current.insert(ADS_FIELD, TypedStatValue::Integer(total as i64));
        self.store.persist_snapshot(StatGroup::Bot, &self.bot_current)?;
        Ok(total)
    }

    /// Game and bot deltas since the session started.
    pub fn session_report(&self) -> SessionReport {
        SessionReport::new(
            self.session.clone(),
            diff(&self.session_start, &self.current, self.layout.stat_names()),
            diff_all(&self.bot_start, &self.bot_current),
        )
    }

    /// Persists the session report.
    pub fn finish_session(&mut self) -> Result<SessionReport> {
        let report = self.session_report();
        self.store.persist_session(&report)?;
        info!("Session {} saved", self.session.id);
        if self.session.log_file.is_some() {
            logging::set_session_log(None);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SequenceCapture, StillCapture};
    use crate::layout::{MODE_DIGITS, MODE_LINE, MODE_LINE_DEFAULT};
    use crate::store::JsonStore;
    use image::{GrayImage, Luma, Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::tempdir;

    /// Answers by mode; each mode can queue several answers, the last repeats.
    struct ScriptedOcr {
        answers: RefCell<HashMap<String, Vec<String>>>,
    }

    impl ScriptedOcr {
        fn new(script: &[(&str, &[&str])]) -> Self {
            let answers = script
                .iter()
                .map(|(mode, texts)| {
                    (
                        mode.to_string(),
                        texts.iter().map(|t| t.to_string()).collect(),
                    )
                })
                .collect();
            Self {
                answers: RefCell::new(answers),
            }
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, _image: &GrayImage, mode: &str) -> Result<String> {
            let mut answers = self.answers.borrow_mut();
            let Some(queue) = answers.get_mut(mode) else {
                return Ok(String::new());
            };
            if queue.len() > 1 {
                Ok(queue.remove(0))
            } else {
                Ok(queue.first().cloned().unwrap_or_default())
            }
        }
    }

    fn screen() -> StillCapture {
        StillCapture::new(RgbaImage::new(480, 800))
    }

    fn tracker<C: CaptureProvider>(
        capture: C,
        ocr: ScriptedOcr,
        path: &std::path::Path,
    ) -> StatsTracker<C, ScriptedOcr, JsonStore> {
        StatsTracker::new(
            Layout::builtin("480x800", false).unwrap(),
            capture,
            FieldExtractor::new(ocr),
            JsonStore::open(path).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_update_rotates_baseline_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statistics.json");
        let ocr = ScriptedOcr::new(&[
            (MODE_LINE, &["100", "150"]),
            (MODE_LINE_DEFAULT, &["Gold: 1.2K"]),
        ]);
        let mut stats = tracker(screen(), ocr, &path);

        stats.update_stats().unwrap();
        assert_eq!(stats.highest_stage(), Some(100));

        stats.update_stats().unwrap();
        assert_eq!(stats.highest_stage(), Some(150));
        assert_eq!(stats.deltas()["highest_stage_reached"].diff, Some(50.0));
        assert_eq!(stats.deltas()["gold_accumulated"].diff, Some(0.0));

        let reopened = JsonStore::open(&path).unwrap();
        let stored = reopened.load_snapshot(StatGroup::Game).unwrap().unwrap();
        assert_eq!(stored.get("highest_stage_reached"), Some(&TypedStatValue::Integer(150)));
    }

    #[test]
    fn test_unreadable_digits_fall_back() {
        let dir = tempdir().unwrap();
        let ocr = ScriptedOcr::new(&[(MODE_LINE_DEFAULT, &["??"])]);
        let mut stats = tracker(screen(), ocr, &dir.path().join("statistics.json"));

        // Digits-only fields fall back to 1, never to an error
        stats.update_stats().unwrap();
        assert_eq!(stats.highest_stage(), Some(1));
        assert_eq!(stats.current().get("taps"), Some(&TypedStatValue::Unparsable));
    }

    #[test]
    fn test_stage_ocr_updates_props() {
        let dir = tempdir().unwrap();
        let ocr = ScriptedOcr::new(&[(MODE_DIGITS, &["4521"])]);
        let mut stats = tracker(screen(), ocr, &dir.path().join("statistics.json"));

        assert_eq!(stats.stage_ocr().unwrap(), TypedStatValue::Integer(4521));
        assert_eq!(stats.props().current_stage(), Some(4521));
    }

    #[test]
    fn test_unreadable_stage_is_unparsable() {
        let dir = tempdir().unwrap();
        let ocr = ScriptedOcr::new(&[(MODE_LINE_DEFAULT, &["1:02:03"]), (MODE_DIGITS, &[""])]);
        let mut stats = tracker(screen(), ocr, &dir.path().join("statistics.json"));

        // No digits on a single stage read is no data, not stage 1
        assert_eq!(stats.stage_ocr().unwrap(), TypedStatValue::Unparsable);
        assert_eq!(stats.props().current_stage(), None);

        let record = stats.record_prestige(None, None).unwrap();
        assert_eq!(record.advance_start, None);
        assert_eq!(stats.props().advance_start(), None);
    }

    #[test]
    fn test_session_log_is_recorded_in_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statistics.json");
        let mut stats = tracker(screen(), ScriptedOcr::new(&[]), &path);

        let log_path = stats.attach_session_log(dir.path());
        assert_eq!(log_path, dir.path().join(format!("{}.log", stats.session().id)));
        assert_eq!(stats.session().log_file.as_deref(), Some(log_path.as_path()));

        let report = stats.finish_session().unwrap();
        assert_eq!(report.session.log_file, Some(log_path));

        let reopened = JsonStore::open(&path).unwrap();
        let stored = &reopened.data().sessions[&report.session.day()][&report.session.id.to_string()];
        assert_eq!(stored.session.log_file, report.session.log_file);
    }

    #[test]
    fn test_record_prestige() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statistics.json");
        let ocr = ScriptedOcr::new(&[(MODE_LINE_DEFAULT, &["1:02:03"]), (MODE_DIGITS, &["Start 120"])]);
        let mut stats = tracker(screen(), ocr, &path);

        let record = stats.record_prestige(Some("book_of_shadows"), Some(4000)).unwrap();
        assert_eq!(record.time, Some(Duration::from_secs(3723)));
        assert_eq!(record.advance_start, Some(120));
        assert_eq!(record.artifact.as_deref(), Some("book_of_shadows"));
        assert_eq!(stats.props().last_prestige(), Some(record.timestamp));

        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(reopened.data().prestiges, vec![record]);
    }

    #[test]
    fn test_unreadable_prestige_time_is_none() {
        let dir = tempdir().unwrap();
        let ocr = ScriptedOcr::new(&[(MODE_LINE_DEFAULT, &["12:xx"]), (MODE_DIGITS, &["7"])]);
        let mut stats = tracker(screen(), ocr, &dir.path().join("statistics.json"));

        let record = stats.record_prestige(None, None).unwrap();
        assert_eq!(record.time, None);
        assert_eq!(record.advance_start, Some(7));
    }

    #[test]
    fn test_raid_attacks_reset() {
        let dir = tempdir().unwrap();
        let ocr = ScriptedOcr::new(&[(MODE_LINE_DEFAULT, &["Attacks reset in 1d 5h"])]);
        let mut stats = tracker(screen(), ocr, &dir.path().join("statistics.json"));

        let before = Local::now();
        let reset = stats.raid_attacks_reset().unwrap().unwrap();
        let ahead = reset - before;
        assert!(ahead >= chrono::Duration::hours(29));
        assert!(ahead < chrono::Duration::hours(29) + chrono::Duration::minutes(1));
        assert_eq!(stats.props().next_raid_reset(), Some(reset));
    }

    #[test]
    fn test_raid_reset_unreadable() {
        let dir = tempdir().unwrap();
        let ocr = ScriptedOcr::new(&[(MODE_LINE_DEFAULT, &["Attacks reset soon"])]);
        let mut stats = tracker(screen(), ocr, &dir.path().join("statistics.json"));
        assert_eq!(stats.raid_attacks_reset().unwrap(), None);
    }

    #[test]
    fn test_skill_and_tournament_reads() {
        let dir = tempdir().unwrap();
        let ocr = ScriptedOcr::new(&[
            (MODE_LINE_DEFAULT, &["Lv. 25"]),
            (MODE_DIGITS, &[" 17 "]),
            (MODE_LINE, &[" titan_slayer "]),
        ]);
        let mut stats = tracker(screen(), ocr, &dir.path().join("statistics.json"));
        let region = CaptureRegion::new(10, 10, 60, 20);

        assert_eq!(stats.skill_level(region).unwrap(), TypedStatValue::Integer(25));
        assert_eq!(stats.tournament_rank(region, Some(100)).unwrap(), TypedStatValue::Text("17".into()));
        assert_eq!(
            stats.tournament_user(region).unwrap(),
            TypedStatValue::Text("titan_slayer".into())
        );
        assert_eq!(stats.tournament_stage(region).unwrap(), TypedStatValue::Text("17".into()));
    }

    #[test]
    fn test_increment_ads_accumulates_across_sessions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statistics.json");

        {
            let mut stats = tracker(screen(), ScriptedOcr::new(&[]), &path);
            assert_eq!(stats.increment_ads().unwrap(), 1);
            assert_eq!(stats.increment_ads().unwrap(), 2);
        }

        let mut stats = tracker(screen(), ScriptedOcr::new(&[]), &path);
        assert_eq!(stats.increment_ads().unwrap(), 3);
        assert_eq!(stats.props().ads_collected(), 1);

        let report = stats.finish_session().unwrap();
        assert_eq!(report.bot[ADS_FIELD].diff, Some(1.0));
    }

    /// Artifact panel frame: a dark band at `offset` plus artifact tag pixels.
    fn artifact_frame(offset: u32, tags: &[u8]) -> RgbaImage {
        let mut frame = RgbaImage::from_fn(480, 800, |_, y| {
            let top = 240 + offset * 60;
            if y >= top && y < top + 160 {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([230, 230, 230, 255])
            }
        });
        for (i, tag) in tags.iter().enumerate() {
            frame.put_pixel(10 + i as u32, 250, Rgba([*tag, *tag, *tag, 255]));
        }
        frame
    }

    struct TagMatcher;

    impl Matcher for TagMatcher {
        fn contains(&self, haystack: &GrayImage, needle: &GrayImage) -> bool {
            let tag = needle.get_pixel(0, 0)[0];
            haystack.pixels().any(|p| p[0] == tag)
        }
    }

    #[test]
    fn test_parse_artifacts_marks_found_entries_owned() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statistics.json");
        let capture = SequenceCapture::new(vec![
            artifact_frame(0, &[101]),
            artifact_frame(1, &[102]),
            artifact_frame(2, &[101]),
        ]);
        let mut scroll = capture.scroller();
        let mut stats = tracker(capture, ScriptedOcr::new(&[]), &path);

        let catalog = vec![
            CatalogEntry::new("book_of_shadows", GrayImage::from_pixel(1, 1, Luma([101]))),
            CatalogEntry::new("charged_card", GrayImage::from_pixel(1, 1, Luma([102]))),
            CatalogEntry::new("heroic_shield", GrayImage::from_pixel(1, 1, Luma([103]))),
        ];
        let mut options = ScanOptions::new(stats.layout().scroll_start, stats.layout().scroll_end);
        options.settle = Duration::ZERO;

        let scan = stats
            .parse_artifacts(&mut scroll, &catalog, &TagMatcher, &options)
            .unwrap();

        assert_eq!(scan.pages, 3);
        assert_eq!(scan.end, ScanEnd::Duplicate);
        assert_eq!(scan.newly_owned, vec!["book_of_shadows", "charged_card"]);
        assert!(!stats.ownership().is_owned("heroic_shield"));

        let stored = JsonStore::open(&path).unwrap().load_ownership().unwrap();
        assert!(stored.is_owned("charged_card"));
    }
}
