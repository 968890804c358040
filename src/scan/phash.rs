//! Average-hash fingerprints for telling scroll positions apart.

use image::{DynamicImage, GrayImage};
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// Hamming distance below which two captures count as the same page.
pub const DEFAULT_CUTOFF: u32 = 2;

const HASH_SIZE: u32 = 8;

/// 64-bit mean-brightness fingerprint over an 8x8 downsample.
pub fn fingerprint(image: &GrayImage) -> ImageHash {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .hash_size(HASH_SIZE, HASH_SIZE)
        .to_hasher();
    hasher.hash_image(&DynamicImage::ImageLuma8(image.clone()))
}

/// Number of differing fingerprint bits.
pub fn distance(a: &GrayImage, b: &GrayImage) -> u32 {
    fingerprint(a).dist(&fingerprint(b))
}

/// True when the fingerprints differ in fewer than `cutoff` bits.
///
/// Identical fingerprints are always duplicates, so a cutoff of zero still
/// recognizes the same image.
pub fn is_duplicate(a: &GrayImage, b: &GrayImage, cutoff: u32) -> bool {
    within_cutoff(distance(a, b), cutoff)
}

/// Duplicate rule over an already computed distance.
pub fn within_cutoff(distance: u32, cutoff: u32) -> bool {
    distance == 0 || distance < cutoff
}
