//! Static screen layouts.
//!
//! Every region the crate reads is defined here, at the 480x800 base
//! resolution, and scaled for larger windows. Panels that move while an
//! event banner is shown have an event variant.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::capture::{CaptureRegion, Point};
use crate::ocr::CoercionKind;

/// Single text line, legacy engine.
pub const MODE_LINE: &str = "--psm 7 --oem 0";
/// Single text line, default engine.
pub const MODE_LINE_DEFAULT: &str = "--psm 7";
/// Single line of digits, legacy engine.
pub const MODE_DIGITS: &str = "--psm 7 --oem 0 nobatch digits";

/// Blob area below which specks are painted out of digit captures.
pub const DIGIT_BLOB_THRESHOLD: u32 = 150;

/// How to read one statistic off the screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub region: CaptureRegion,
    /// Opaque OCR configuration passed to the engine
    pub mode: String,
    pub kind: CoercionKind,
    pub scale: f32,
    /// Minimum blob area kept by the denoise step; None skips denoising
    pub threshold: Option<u32>,
    pub invert: bool,
}

impl FieldSpec {
    /// Digits on a busy background: upscale, denoise, invert.
    pub fn digits(name: &str, region: CaptureRegion, mode: &str) -> Self {
        Self {
            name: name.to_string(),
            region,
            mode: mode.to_string(),
            kind: CoercionKind::DigitsOnly,
            scale: 5.0,
            threshold: Some(DIGIT_BLOB_THRESHOLD),
            invert: true,
        }
    }

    /// Plain text line read as `kind`, upscaled only.
    pub fn line(name: &str, region: CaptureRegion, kind: CoercionKind, mode: &str) -> Self {
        Self {
            name: name.to_string(),
            region,
            mode: mode.to_string(),
            kind,
            scale: 5.0,
            threshold: None,
            invert: false,
        }
    }

    pub fn with_kind(mut self, kind: CoercionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_threshold(mut self, threshold: Option<u32>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    fn scaled(mut self, factor: f32) -> Self {
        self.region = self.region.scaled(factor);
        self
    }
}

/// Skill level text next to a skill icon.
pub fn skill_level_spec(region: CaptureRegion) -> FieldSpec {
    FieldSpec::line("skill_level", region, CoercionKind::SkillLevel, MODE_LINE_DEFAULT)
        .with_invert(true)
}

/// Player rank in a tournament list row.
pub fn tournament_rank_spec(region: CaptureRegion, threshold: Option<u32>) -> FieldSpec {
    FieldSpec::line("tournament_rank", region, CoercionKind::FreeText, MODE_DIGITS)
        .with_scale(4.0)
        .with_threshold(threshold)
}

/// Player name in a tournament list row.
pub fn tournament_user_spec(region: CaptureRegion) -> FieldSpec {
    FieldSpec::line("tournament_user", region, CoercionKind::FreeText, MODE_LINE).with_scale(3.0)
}

/// Stage reached in a tournament list row.
pub fn tournament_stage_spec(region: CaptureRegion) -> FieldSpec {
    FieldSpec {
        kind: CoercionKind::FreeText,
        ..FieldSpec::digits("tournament_stage", region, MODE_DIGITS)
    }
}

/// Probe regions for one equipment slot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GearSlot {
    /// Where the "equip" button shows for unequipped gear
    pub base: CaptureRegion,
    /// Where the lock icon shows
    pub locked: CaptureRegion,
    /// Where the bonus type icon shows
    pub bonus: CaptureRegion,
    /// Tap target of the equip button
    pub equip: Point,
}

/// Probe regions for one hero row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeroSlot {
    /// Damage type icon
    pub kind: CaptureRegion,
    /// DPS text, compared against the zero-dps image
    pub dps: CaptureRegion,
}

/// All regions for one resolution and event mode.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub resolution: String,
    pub events_active: bool,
    /// Stats panel rows, in read order
    pub stats: Vec<FieldSpec>,
    pub stage: FieldSpec,
    pub advance_start: FieldSpec,
    pub time_since_prestige: FieldSpec,
    pub raid_attack_reset: FieldSpec,
    /// Visible part of the artifacts panel
    pub artifact_region: CaptureRegion,
    pub scroll_start: Point,
    pub scroll_end: Point,
    pub gear_slots: Vec<GearSlot>,
    pub hero_slots: Vec<HeroSlot>,
}

/// Stats panel rows: name, kind.
const STATS_ROWS: &[(&str, CoercionKind)] = &[
    ("highest_stage_reached", CoercionKind::DigitsOnly),
    ("total_pet_level", CoercionKind::DigitsOnly),
    ("gold_accumulated", CoercionKind::Suffixed),
    ("total_tap_damage", CoercionKind::Suffixed),
    ("monsters_killed", CoercionKind::Suffixed),
    ("bosses_killed", CoercionKind::Suffixed),
    ("critical_hits", CoercionKind::Suffixed),
    ("fairies_tapped", CoercionKind::Suffixed),
    ("daily_achievements", CoercionKind::Suffixed),
    ("relics_earned", CoercionKind::Suffixed),
    ("taps", CoercionKind::Suffixed),
    ("prestiges", CoercionKind::DigitsOnly),
    ("days_since_install", CoercionKind::DigitsOnly),
    ("play_time", CoercionKind::FreeText),
];

const STATS_TOP: u32 = 178;
const STATS_ROW_HEIGHT: u32 = 32;

/// Extra offset of prestige panel content while the event banner shows.
const EVENT_PRESTIGE_SHIFT: u32 = 42;

fn stats_row(index: u32) -> CaptureRegion {
    CaptureRegion::new(40, STATS_TOP + index * STATS_ROW_HEIGHT, 400, 26)
}

fn base_stats() -> Vec<FieldSpec> {
    STATS_ROWS
        .iter()
        .zip(0u32..)
        .map(|(&(name, kind), index)| match kind {
            CoercionKind::DigitsOnly => FieldSpec::digits(name, stats_row(index), MODE_LINE),
            _ => FieldSpec::line(name, stats_row(index), kind, MODE_LINE_DEFAULT),
        })
        .collect()
}

fn base_gear_slots() -> Vec<GearSlot> {
    (0..4)
        .map(|i| {
            let top = 300 + i * 100;
            GearSlot {
                base: CaptureRegion::new(360, top + 30, 100, 40),
                locked: CaptureRegion::new(20, top + 5, 30, 30),
                bonus: CaptureRegion::new(120, top + 45, 200, 30),
                equip: Point::new(410, top + 50),
            }
        })
        .collect()
}

fn base_hero_slots() -> Vec<HeroSlot> {
    (0..3)
        .map(|i| {
            let top = 440 + i * 80;
            HeroSlot {
                kind: CaptureRegion::new(100, top + 40, 30, 30),
                dps: CaptureRegion::new(140, top + 40, 150, 30),
            }
        })
        .collect()
}

fn resolution_factor(resolution: &str) -> Option<f32> {
    match resolution {
        "480x800" => Some(1.0),
        "720x1280" => Some(1.5),
        "1080x1920" => Some(2.25),
        _ => None,
    }
}

impl Layout {
    /// Returns the built-in layout for `resolution` ("<w>x<h>").
    pub fn builtin(resolution: &str, events_active: bool) -> Result<Self> {
        let factor = resolution_factor(resolution)
            .ok_or_else(|| anyhow!("No layout defined for resolution {}", resolution))?;

        let prestige_shift = if events_active { EVENT_PRESTIGE_SHIFT } else { 0 };

        let layout = Self {
            resolution: resolution.to_string(),
            events_active,
            stats: base_stats()
                .into_iter()
                .map(|spec| spec.scaled(factor))
                .collect(),
            stage: FieldSpec::digits("current_stage", CaptureRegion::new(200, 40, 80, 30), MODE_DIGITS)
                .with_kind(CoercionKind::Digits)
                .scaled(factor),
            advance_start: FieldSpec::digits(
                "advance_start",
                CaptureRegion::new(250, 520, 120, 28).shifted_down(prestige_shift),
                MODE_DIGITS,
            )
            .with_kind(CoercionKind::Digits)
            .scaled(factor),
            time_since_prestige: FieldSpec::line(
                "time_since_prestige",
                CaptureRegion::new(170, 440, 140, 28).shifted_down(prestige_shift),
                CoercionKind::Duration,
                MODE_LINE_DEFAULT,
            )
            .with_scale(1.0)
            .scaled(factor),
            raid_attack_reset: FieldSpec::line(
                "raid_attack_reset",
                CaptureRegion::new(90, 610, 300, 24),
                CoercionKind::Countdown,
                MODE_LINE_DEFAULT,
            )
            .with_scale(3.0)
            .with_invert(true)
            .scaled(factor),
            artifact_region: CaptureRegion::new(0, 240, 480, 480).scaled(factor),
            scroll_start: Point::new(240, 660).scaled(factor),
            scroll_end: Point::new(240, 300).scaled(factor),
            gear_slots: base_gear_slots()
                .into_iter()
                .map(|slot| GearSlot {
                    base: slot.base.scaled(factor),
                    locked: slot.locked.scaled(factor),
                    bonus: slot.bonus.scaled(factor),
                    equip: slot.equip.scaled(factor),
                })
                .collect(),
            hero_slots: base_hero_slots()
                .into_iter()
                .map(|slot| HeroSlot {
                    kind: slot.kind.scaled(factor),
                    dps: slot.dps.scaled(factor),
                })
                .collect(),
        };

        layout.validate()?;
        Ok(layout)
    }

    /// Looks up a stats panel field by name.
    pub fn stat(&self, name: &str) -> Option<&FieldSpec> {
        self.stats.iter().find(|spec| spec.name == name)
    }

    pub fn stat_names(&self) -> impl Iterator<Item = &str> {
        self.stats.iter().map(|spec| spec.name.as_str())
    }

    /// Rejects tables where a field name repeats (it could then coerce to two
    /// kinds) or a spec could never produce an image.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let singles = [
            &self.stage,
            &self.advance_start,
            &self.time_since_prestige,
            &self.raid_attack_reset,
        ];

        for spec in self.stats.iter().chain(singles) {
            if !seen.insert(spec.name.as_str()) {
                bail!("Field {} is defined more than once", spec.name);
            }
            if spec.region.is_empty() {
                bail!("Field {} has an empty region", spec.name);
            }
            if !(spec.scale.is_finite() && spec.scale > 0.0) {
                bail!("Field {} has invalid scale {}", spec.name, spec.scale);
            }
        }

        if self.artifact_region.is_empty() {
            bail!("Artifact region is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_base_layout() {
        let layout = Layout::builtin("480x800", false).unwrap();
        assert_eq!(layout.stats.len(), STATS_ROWS.len());

        let stage = layout.stat("highest_stage_reached").unwrap();
        assert_eq!(stage.kind, CoercionKind::DigitsOnly);
        assert_eq!(stage.threshold, Some(DIGIT_BLOB_THRESHOLD));
        assert!(stage.invert);

        let gold = layout.stat("gold_accumulated").unwrap();
        assert_eq!(gold.kind, CoercionKind::Suffixed);
        assert_eq!(gold.threshold, None);

        // Single stage reads have no digits fallback
        assert_eq!(layout.stage.kind, CoercionKind::Digits);
        assert_eq!(layout.advance_start.kind, CoercionKind::Digits);
        assert_eq!(layout.stage.threshold, Some(DIGIT_BLOB_THRESHOLD));
    }

    #[test]
    fn test_event_layout_moves_prestige_panel() {
        let base = Layout::builtin("480x800", false).unwrap();
        let event = Layout::builtin("480x800", true).unwrap();

        assert_eq!(
            event.advance_start.region.y,
            base.advance_start.region.y + EVENT_PRESTIGE_SHIFT
        );
        assert_eq!(event.stats, base.stats);
    }

    #[test]
    fn test_larger_resolution_scales_regions() {
        let base = Layout::builtin("480x800", false).unwrap();
        let large = Layout::builtin("720x1280", false).unwrap();

        assert_eq!(large.stats[0].region, base.stats[0].region.scaled(1.5));
        assert_eq!(large.scroll_start, base.scroll_start.scaled(1.5));
        assert_eq!(large.gear_slots.len(), base.gear_slots.len());
    }

    #[test]
    fn test_unknown_resolution_is_an_error() {
        assert!(Layout::builtin("100x100", false).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut layout = Layout::builtin("480x800", false).unwrap();
        let duplicate = FieldSpec {
            kind: CoercionKind::FreeText,
            ..layout.stats[0].clone()
        };
        layout.stats.push(duplicate);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_row_regions_do_not_overlap() {
        let layout = Layout::builtin("480x800", false).unwrap();
        for pair in layout.stats.windows(2) {
            assert!(pair[0].region.y + pair[0].region.height <= pair[1].region.y);
        }
    }
}
