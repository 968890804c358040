use image::GrayImage;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

/// Default normalized cross-correlation score for a positive match.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.9;

/// Presence probe: is `needle` somewhere in `haystack`?
///
/// Shared across dispatcher workers, so implementations must be `Sync`.
pub trait Matcher: Sync {
    fn contains(&self, haystack: &GrayImage, needle: &GrayImage) -> bool;
}

impl<T: Matcher + ?Sized> Matcher for &T {
    fn contains(&self, haystack: &GrayImage, needle: &GrayImage) -> bool {
        (**self).contains(haystack, needle)
    }
}

/// Template matching by normalized cross-correlation.
#[derive(Clone, Copy, Debug)]
pub struct TemplateMatcher {
    pub threshold: f32,
}

impl TemplateMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Best correlation score of `needle` over `haystack`, if it fits.
    pub fn best_score(&self, haystack: &GrayImage, needle: &GrayImage) -> Option<f32> {
        let (hw, hh) = haystack.dimensions();
        let (nw, nh) = needle.dimensions();
        if nw == 0 || nh == 0 || nw > hw || nh > hh {
            return None;
        }

        let scores = match_template(haystack, needle, MatchTemplateMethod::CrossCorrelationNormalized);
        let best = find_extremes(&scores).max_value;
        // All-black windows divide by zero
        best.is_finite().then_some(best)
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl Matcher for TemplateMatcher {
    fn contains(&self, haystack: &GrayImage, needle: &GrayImage) -> bool {
        self.best_score(haystack, needle)
            .is_some_and(|score| score >= self.threshold)
    }
}
