use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A rectangle in screen pixels, origin at the top-left of the game window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Multiplies origin and size, used to derive larger layouts from the base one.
    pub fn scaled(&self, factor: f32) -> Self {
        let scale = |v: u32| (v as f32 * factor).round() as u32;
        Self {
            x: scale(self.x),
            y: scale(self.y),
            width: scale(self.width).max(1),
            height: scale(self.height).max(1),
        }
    }

    /// Moves the region down by `dy` pixels.
    pub fn shifted_down(&self, dy: u32) -> Self {
        Self {
            y: self.y + dy,
            ..*self
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A screen coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: (self.x as f32 * factor).round() as u32,
            y: (self.y as f32 * factor).round() as u32,
        }
    }
}

/// Crops a region out of a full screenshot.
///
/// Clamps to image bounds; a region entirely outside the image yields an
/// empty image.
pub fn crop_region(img: &RgbaImage, region: &CaptureRegion) -> RgbaImage {
    let (w, h) = img.dimensions();

    let x0 = region.x.min(w);
    let y0 = region.y.min(h);
    let rw = region.width.min(w - x0);
    let rh = region.height.min(h - y0);

    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_crop_region() {
        // 100x200 image
        let img: RgbaImage =
            RgbaImage::from_fn(100, 200, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let region = CaptureRegion::new(10, 50, 50, 20);
        let cropped = crop_region(&img, &region);

        assert_eq!(cropped.dimensions(), (50, 20));
        // Top-left pixel should be (10, 50) from original
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }

    #[test]
    fn test_crop_region_clamps() {
        let img = RgbaImage::new(100, 100);
        let region = CaptureRegion::new(90, 90, 50, 50);
        let cropped = crop_region(&img, &region);

        // Should clamp to 10x10 (remaining pixels)
        assert_eq!(cropped.dimensions(), (10, 10));
    }

    #[test]
    fn test_crop_region_outside_is_empty() {
        let img = RgbaImage::new(100, 100);
        let cropped = crop_region(&img, &CaptureRegion::new(150, 10, 20, 20));
        assert_eq!(cropped.dimensions(), (0, 20));
    }

    #[test]
    fn test_scaled_region() {
        let region = CaptureRegion::new(20, 40, 100, 30).scaled(1.5);
        assert_eq!(region, CaptureRegion::new(30, 60, 150, 45));
        assert_eq!(region.center(), Point::new(105, 82));
    }
}
