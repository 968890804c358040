//! Equipment and hero panel lookups by image presence.

use anyhow::{Context, Result};
use image::{imageops, GrayImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::capture::{CaptureProvider, CaptureRegion, Point};
use crate::layout::{GearSlot, HeroSlot};
use crate::scan::Matcher;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Melee,
    Spell,
    Ranged,
}

impl DamageType {
    pub const ALL: [DamageType; 3] = [DamageType::Melee, DamageType::Spell, DamageType::Ranged];

    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Melee => "melee",
            DamageType::Spell => "spell",
            DamageType::Ranged => "ranged",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of looking for a locked gear piece of one bonus type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GearLookup {
    NotFound,
    /// The piece is already worn
    Equipped,
    /// Tap here to equip it
    EquipAt(Point),
}

impl GearLookup {
    pub fn found(&self) -> bool {
        !matches!(self, GearLookup::NotFound)
    }
}

/// Reference images for the equipment panel.
#[derive(Clone, Debug)]
pub struct GearImages {
    pub equip: GrayImage,
    pub locked: GrayImage,
    pub bonus_melee: GrayImage,
    pub bonus_spell: GrayImage,
    pub bonus_ranged: GrayImage,
}

impl GearImages {
    pub fn bonus(&self, kind: DamageType) -> &GrayImage {
        match kind {
            DamageType::Melee => &self.bonus_melee,
            DamageType::Spell => &self.bonus_spell,
            DamageType::Ranged => &self.bonus_ranged,
        }
    }

    /// Loads `equip.png`, `locked.png` and `bonus_<type>.png` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            equip: load_gray(dir, "equip")?,
            locked: load_gray(dir, "locked")?,
            bonus_melee: load_gray(dir, "bonus_melee")?,
            bonus_spell: load_gray(dir, "bonus_spell")?,
            bonus_ranged: load_gray(dir, "bonus_ranged")?,
        })
    }
}

/// Reference images for the hero panel.
#[derive(Clone, Debug)]
pub struct HeroImages {
    pub melee_type: GrayImage,
    pub spell_type: GrayImage,
    pub ranged_type: GrayImage,
    pub zero_dps: GrayImage,
}

impl HeroImages {
    pub fn type_icon(&self, kind: DamageType) -> &GrayImage {
        match kind {
            DamageType::Melee => &self.melee_type,
            DamageType::Spell => &self.spell_type,
            DamageType::Ranged => &self.ranged_type,
        }
    }

    /// Loads `<type>_type.png` and `zero_dps.png` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            melee_type: load_gray(dir, "melee_type")?,
            spell_type: load_gray(dir, "spell_type")?,
            ranged_type: load_gray(dir, "ranged_type")?,
            zero_dps: load_gray(dir, "zero_dps")?,
        })
    }
}

fn load_gray(dir: &Path, stem: &str) -> Result<GrayImage> {
    let path = dir.join(format!("{}.png", stem));
    Ok(image::open(&path)
        .with_context(|| format!("Failed to load reference image {}", path.display()))?
        .to_luma8())
}

fn probe<C, M>(capture: &mut C, matcher: &M, region: &CaptureRegion, needle: &GrayImage) -> Result<bool>
where
    C: CaptureProvider + ?Sized,
    M: Matcher + ?Sized,
{
    let raw = capture.capture(region)?;
    Ok(matcher.contains(&imageops::grayscale(&raw), needle))
}

/// Finds the first locked gear piece whose bonus is `kind`.
///
/// Expects the equipment panel open and scrolled to the top. Slots are
/// checked top to bottom; unlocked pieces are skipped.
pub fn find_first_gear_of<C, M>(
    kind: DamageType,
    capture: &mut C,
    matcher: &M,
    slots: &[GearSlot],
    images: &GearImages,
) -> Result<GearLookup>
where
    C: CaptureProvider + ?Sized,
    M: Matcher + ?Sized,
{
    for (index, slot) in slots.iter().enumerate() {
        let locked = probe(capture, matcher, &slot.locked, &images.locked)?;
        let of_kind = locked && probe(capture, matcher, &slot.bonus, images.bonus(kind))?;
        debug!(
            "Gear {}: locked={} {}={}",
            index + 1,
            locked,
            kind,
            of_kind
        );
        if !of_kind {
            continue;
        }

        // No equip button means it is already worn
        let equipped = !probe(capture, matcher, &slot.base, &images.equip)?;
        return Ok(if equipped {
            GearLookup::Equipped
        } else {
            GearLookup::EquipAt(slot.equip)
        });
    }
    Ok(GearLookup::NotFound)
}

/// Damage type of the first hero that has been levelled.
pub fn first_hero_damage_type<C, M>(
    capture: &mut C,
    matcher: &M,
    slots: &[HeroSlot],
    images: &HeroImages,
) -> Result<Option<DamageType>>
where
    C: CaptureProvider + ?Sized,
    M: Matcher + ?Sized,
{
    for (index, slot) in slots.iter().enumerate() {
        let has_damage = !probe(capture, matcher, &slot.dps, &images.zero_dps)?;
        if !has_damage {
            debug!("Hero {}: no damage yet", index + 1);
            continue;
        }

        let icon = capture.capture(&slot.kind)?;
        let icon = imageops::grayscale(&icon);
        if let Some(kind) = DamageType::ALL
            .into_iter()
            .find(|kind| matcher.contains(&icon, images.type_icon(*kind)))
        {
            debug!("Hero {}: {}", index + 1, kind);
            return Ok(Some(kind));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::StillCapture;
    use crate::layout::Layout;
    use image::{Luma, Rgba, RgbaImage};

    const EQUIP: u8 = 11;
    const LOCKED: u8 = 12;
    const MELEE: u8 = 13;
    const SPELL: u8 = 14;
    const RANGED: u8 = 15;
    const ZERO_DPS: u8 = 16;

    struct TagMatcher;

    impl Matcher for TagMatcher {
        fn contains(&self, haystack: &GrayImage, needle: &GrayImage) -> bool {
            let tag = needle.get_pixel(0, 0)[0];
            haystack.pixels().any(|p| p[0] == tag)
        }
    }

    fn tag(value: u8) -> GrayImage {
        GrayImage::from_pixel(1, 1, Luma([value]))
    }

    fn gear_images() -> GearImages {
        GearImages {
            equip: tag(EQUIP),
            locked: tag(LOCKED),
            bonus_melee: tag(MELEE),
            bonus_spell: tag(SPELL),
            bonus_ranged: tag(RANGED),
        }
    }

    fn hero_images() -> HeroImages {
        HeroImages {
            melee_type: tag(MELEE),
            spell_type: tag(SPELL),
            ranged_type: tag(RANGED),
            zero_dps: tag(ZERO_DPS),
        }
    }

    fn paint(screen: &mut RgbaImage, region: &CaptureRegion, value: u8) {
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                screen.put_pixel(x, y, Rgba([value, value, value, 255]));
            }
        }
    }

    fn blank() -> RgbaImage {
        RgbaImage::from_pixel(480, 800, Rgba([200, 200, 200, 255]))
    }

    #[test]
    fn test_first_locked_gear_of_type_with_equip_button() {
        let layout = Layout::builtin("480x800", false).unwrap();
        let slots = &layout.gear_slots;
        let mut screen = blank();
        // Slot 1: spell, unlocked. Slot 2: spell, locked, not worn.
        paint(&mut screen, &slots[0].bonus, SPELL);
        paint(&mut screen, &slots[0].base, EQUIP);
        paint(&mut screen, &slots[1].locked, LOCKED);
        paint(&mut screen, &slots[1].bonus, SPELL);
        paint(&mut screen, &slots[1].base, EQUIP);

        let mut capture = StillCapture::new(screen);
        let found =
            find_first_gear_of(DamageType::Spell, &mut capture, &TagMatcher, slots, &gear_images()).unwrap();
        assert_eq!(found, GearLookup::EquipAt(slots[1].equip));
    }

    #[test]
    fn test_worn_gear_reports_equipped() {
        let layout = Layout::builtin("480x800", false).unwrap();
        let slots = &layout.gear_slots;
        let mut screen = blank();
        paint(&mut screen, &slots[0].locked, LOCKED);
        paint(&mut screen, &slots[0].bonus, MELEE);

        let mut capture = StillCapture::new(screen);
        let found =
            find_first_gear_of(DamageType::Melee, &mut capture, &TagMatcher, slots, &gear_images()).unwrap();
        assert_eq!(found, GearLookup::Equipped);
        assert!(found.found());
    }

    #[test]
    fn test_no_gear_of_type() {
        let layout = Layout::builtin("480x800", false).unwrap();
        let slots = &layout.gear_slots;
        let mut screen = blank();
        paint(&mut screen, &slots[2].locked, LOCKED);
        paint(&mut screen, &slots[2].bonus, MELEE);

        let mut capture = StillCapture::new(screen);
        let found =
            find_first_gear_of(DamageType::Ranged, &mut capture, &TagMatcher, slots, &gear_images()).unwrap();
        assert_eq!(found, GearLookup::NotFound);
    }

    #[test]
    fn test_first_hero_with_damage() {
        let layout = Layout::builtin("480x800", false).unwrap();
        let slots = &layout.hero_slots;
        let mut screen = blank();
        // First hero not levelled yet
        paint(&mut screen, &slots[0].dps, ZERO_DPS);
        paint(&mut screen, &slots[0].kind, MELEE);
        paint(&mut screen, &slots[1].kind, RANGED);

        let mut capture = StillCapture::new(screen);
        let kind = first_hero_damage_type(&mut capture, &TagMatcher, slots, &hero_images()).unwrap();
        assert_eq!(kind, Some(DamageType::Ranged));
    }

    #[test]
    fn test_no_levelled_hero() {
        let layout = Layout::builtin("480x800", false).unwrap();
        let slots = &layout.hero_slots;
        let mut screen = blank();
        for slot in slots {
            paint(&mut screen, &slot.dps, ZERO_DPS);
        }

        let mut capture = StillCapture::new(screen);
        let kind = first_hero_damage_type(&mut capture, &TagMatcher, slots, &hero_images()).unwrap();
        assert_eq!(kind, None);
    }
}
