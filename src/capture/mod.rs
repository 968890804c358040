//! Screen capture seam.
//!
//! This module provides:
//! - Absolute screen regions and points (`CaptureRegion`, `Point`)
//! - The `CaptureProvider` and `ScrollAction` traits everything captures through
//! - Still-image providers backed by screenshots on disk

pub mod region;
pub mod still;

pub use region::{crop_region, CaptureRegion, Point};
pub use still::{SequenceCapture, SequenceScroll, StillCapture};

use anyhow::Result;
use image::RgbaImage;
use std::time::Duration;

/// Synchronous screen-region capture.
pub trait CaptureProvider {
    fn capture(&mut self, region: &CaptureRegion) -> Result<RgbaImage>;
}

impl<T: CaptureProvider + ?Sized> CaptureProvider for &mut T {
    fn capture(&mut self, region: &CaptureRegion) -> Result<RgbaImage> {
        (**self).capture(region)
    }
}

/// Drives a scrollable panel.
pub trait ScrollAction {
    /// Drags from `start` to `end`.
    fn scroll(&mut self, start: Point, end: Point) -> Result<()>;

    /// Waits for the panel to stop moving after a scroll.
    fn settle(&mut self, pause: Duration) {
        std::thread::sleep(pause);
    }
}
