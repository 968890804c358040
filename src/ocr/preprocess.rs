use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Gray level above which a pixel counts as glyph foreground when denoising.
pub const BINARIZE_LEVEL: u8 = 230;

/// Turns a raw capture into an OCR-ready grayscale image.
///
/// Steps, in order:
/// 1. Resize both dimensions by `scale` (Catmull-Rom, i.e. bicubic)
/// 2. Reduce to single-channel grayscale
/// 3. With `threshold`: binarize at [`BINARIZE_LEVEL`] and paint every
///    8-connected blob smaller than `threshold` pixels back to background
/// 4. With `invert`: flip polarity
///
/// The input capture is never modified.
pub fn normalize(
    capture: &RgbaImage,
    scale: f32,
    threshold: Option<u32>,
    invert: bool,
) -> GrayImage {
    let mut gray = imageops::grayscale(&scale_image(capture, scale));

    if let Some(min_area) = threshold.filter(|&t| t > 0) {
        gray = remove_small_blobs(&binarize(&gray, BINARIZE_LEVEL), min_area);
    }

    if invert {
        imageops::invert(&mut gray);
    }

    gray
}

/// Resizes an image by a uniform factor. Non-positive or non-finite factors
/// leave the size unchanged.
fn scale_image(img: &RgbaImage, scale: f32) -> RgbaImage {
    if !scale.is_finite() || scale <= 0.0 || (scale - 1.0).abs() < f32::EPSILON {
        return img.clone();
    }

    let (w, h) = img.dimensions();
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);

    imageops::resize(img, new_w, new_h, FilterType::CatmullRom)
}

/// Pixels brighter than `level` become white (255), everything else black.
pub fn binarize(img: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Paints white blobs with fewer than `min_area` pixels black.
///
/// Expects a binary image (0 background, 255 foreground).
pub fn remove_small_blobs(binary: &GrayImage, min_area: u32) -> GrayImage {
    let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));

    let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut areas = vec![0u32; max_label + 1];
    for label in labels.pixels() {
        areas[label[0] as usize] += 1;
    }

    let mut output = binary.clone();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label != 0 && areas[label] < min_area {
            output.put_pixel(x, y, Luma([0u8]));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn black(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]))
    }

    fn paint(img: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
    }

    #[test]
    fn test_scale_up_and_down() {
        let img = black(40, 20);
        assert_eq!(normalize(&img, 5.0, None, false).dimensions(), (200, 100));
        assert_eq!(normalize(&img, 0.5, None, false).dimensions(), (20, 10));
        assert_eq!(normalize(&img, 1.0, None, false).dimensions(), (40, 20));
    }

    #[test]
    fn test_grayscale_is_unconditional() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([120, 120, 120, 255]));
        let gray = normalize(&img, 1.0, None, false);
        assert_eq!(gray.get_pixel(1, 1)[0], 120);
    }

    #[test]
    fn test_small_blobs_removed_large_kept() {
        let mut img = black(40, 40);
        // Glyph stroke: 10x10 = 100 pixels
        paint(&mut img, 5, 5, 10, 10);
        // Speckle: 2x2 = 4 pixels
        paint(&mut img, 30, 30, 2, 2);

        let cleaned = normalize(&img, 1.0, Some(20), false);

        assert_eq!(cleaned.get_pixel(8, 8)[0], 255, "Glyph should survive");
        assert_eq!(cleaned.get_pixel(30, 30)[0], 0, "Speckle should be removed");
        assert_eq!(cleaned.get_pixel(31, 31)[0], 0, "Speckle should be removed");
    }

    #[test]
    fn test_threshold_binarizes_midtones_to_background() {
        let mut img = black(10, 10);
        paint(&mut img, 0, 0, 10, 10);
        img.put_pixel(4, 4, Rgba([200, 200, 200, 255]));

        let cleaned = normalize(&img, 1.0, Some(5), false);
        assert_eq!(cleaned.get_pixel(4, 4)[0], 0);
        assert_eq!(cleaned.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_invert_runs_last() {
        let mut img = black(20, 20);
        paint(&mut img, 2, 2, 1, 1);

        let inverted = normalize(&img, 1.0, Some(10), true);
        // Speck removed (black) then inverted (white)
        assert_eq!(inverted.get_pixel(2, 2)[0], 255);
        assert_eq!(inverted.get_pixel(10, 10)[0], 255);
    }

    #[test]
    fn test_input_not_mutated() {
        let mut img = black(10, 10);
        paint(&mut img, 0, 0, 1, 1);
        let before = img.clone();

        let _ = normalize(&img, 2.0, Some(50), true);
        assert_eq!(img, before);
    }
}
