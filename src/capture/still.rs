//! Capture providers backed by screenshots already on disk.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::region::{crop_region, CaptureRegion, Point};
use super::{CaptureProvider, ScrollAction};

/// Serves crops of a single full-window screenshot.
pub struct StillCapture {
    screen: RgbaImage,
}

impl StillCapture {
    pub fn new(screen: RgbaImage) -> Self {
        Self { screen }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let screen = image::open(path)
            .with_context(|| format!("Failed to load screenshot {}", path.display()))?
            .to_rgba8();
        Ok(Self::new(screen))
    }
}

impl CaptureProvider for StillCapture {
    fn capture(&mut self, region: &CaptureRegion) -> Result<RgbaImage> {
        crop_checked(&self.screen, region)
    }
}

/// Serves crops of an ordered series of screenshots, one per scroll position.
///
/// Scrolling through the paired [`SequenceScroll`] advances to the next
/// screenshot; past the end the last one keeps being served, the way a panel
/// scrolled to its bottom keeps showing the same content.
pub struct SequenceCapture {
    frames: Vec<RgbaImage>,
    cursor: Arc<AtomicUsize>,
}

impl SequenceCapture {
    pub fn new(frames: Vec<RgbaImage>) -> Self {
        Self {
            frames,
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Loads every PNG in `dir`, ordered by file name.
    pub fn open_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        paths.sort();

        let frames = paths
            .iter()
            .map(|path| {
                image::open(path)
                    .map(|img| img.to_rgba8())
                    .with_context(|| format!("Failed to load screenshot {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns the scroll action that advances this sequence.
    pub fn scroller(&self) -> SequenceScroll {
        SequenceScroll {
            cursor: Arc::clone(&self.cursor),
            last: self.frames.len().saturating_sub(1),
        }
    }
}

impl CaptureProvider for SequenceCapture {
    fn capture(&mut self, region: &CaptureRegion) -> Result<RgbaImage> {
        let index = self.cursor.load(Ordering::SeqCst);
        let frame = self
            .frames
            .get(index)
            .ok_or_else(|| anyhow!("No screenshot available at position {}", index))?;
        crop_checked(frame, region)
    }
}

pub struct SequenceScroll {
    cursor: Arc<AtomicUsize>,
    last: usize,
}

impl ScrollAction for SequenceScroll {
    fn scroll(&mut self, _start: Point, _end: Point) -> Result<()> {
        let _ = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| {
                Some((i + 1).min(self.last))
            });
        Ok(())
    }

    // Frames on disk never move.
    fn settle(&mut self, _pause: Duration) {}
}

fn crop_checked(screen: &RgbaImage, region: &CaptureRegion) -> Result<RgbaImage> {
    let cropped = crop_region(screen, region);
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(anyhow!(
            "Region {:?} lies outside the {}x{} screenshot",
            region,
            screen.width(),
            screen.height()
        ));
    }
    Ok(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(40, 40, Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_still_capture_crops() {
        let mut capture = StillCapture::new(frame(7));
        let img = capture.capture(&CaptureRegion::new(5, 5, 10, 4)).unwrap();
        assert_eq!(img.dimensions(), (10, 4));
        assert_eq!(img.get_pixel(0, 0)[0], 7);
    }

    #[test]
    fn test_still_capture_rejects_outside_region() {
        let mut capture = StillCapture::new(frame(7));
        assert!(capture.capture(&CaptureRegion::new(100, 0, 10, 10)).is_err());
    }

    #[test]
    fn test_sequence_scroll_advances_and_sticks_at_end() {
        let mut capture = SequenceCapture::new(vec![frame(1), frame(2)]);
        let mut scroll = capture.scroller();
        let region = CaptureRegion::new(0, 0, 4, 4);
        let start = Point::new(0, 0);

        assert_eq!(capture.capture(&region).unwrap().get_pixel(0, 0)[0], 1);
        scroll.scroll(start, start).unwrap();
        assert_eq!(capture.capture(&region).unwrap().get_pixel(0, 0)[0], 2);
        scroll.scroll(start, start).unwrap();
        assert_eq!(capture.capture(&region).unwrap().get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn test_empty_sequence_fails_to_capture() {
        let mut capture = SequenceCapture::new(Vec::new());
        assert!(capture.is_empty());
        assert!(capture.capture(&CaptureRegion::new(0, 0, 1, 1)).is_err());
    }
}
