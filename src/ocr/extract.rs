use anyhow::{Context, Result};
use image::{GrayImage, RgbaImage};
use log::debug;

use super::coerce::coerce_field;
use super::engine::OcrEngine;
use super::preprocess::normalize;
use crate::capture::CaptureProvider;
use crate::layout::FieldSpec;
use crate::stats::snapshot::{StatisticsSnapshot, TypedStatValue};

/// Reads typed fields off the screen: capture, normalize, recognize, coerce.
///
/// The OCR engine is handed in at construction; there is no process-wide
/// engine setting.
pub struct FieldExtractor<O> {
    engine: O,
}

impl<O: OcrEngine> FieldExtractor<O> {
    pub fn new(engine: O) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &O {
        &self.engine
    }

    /// Normalizes `capture` per `spec` and returns the raw OCR text.
    pub fn recognize(&self, spec: &FieldSpec, capture: &RgbaImage) -> Result<String> {
        let image = self.prepare(spec, capture);
        let text = self
            .engine
            .recognize(&image, &spec.mode)
            .with_context(|| format!("OCR failed for field {}", spec.name))?;
        debug!("OCR {}: {:?}", spec.name, text.trim());
        Ok(text)
    }

    /// Coerces an already captured region.
    pub fn extract_from_image(&self, spec: &FieldSpec, capture: &RgbaImage) -> Result<TypedStatValue> {
        let text = self.recognize(spec, capture)?;
        Ok(coerce_field(&spec.name, spec.kind, &text))
    }

    /// Captures `spec.region` and coerces it.
    ///
    /// Only capture or OCR backend failures are errors. Unusable text comes
    /// back as `TypedStatValue::Unparsable`.
    pub fn extract_field<C>(&self, spec: &FieldSpec, capture: &mut C) -> Result<TypedStatValue>
    where
        C: CaptureProvider + ?Sized,
    {
        let raw = capture
            .capture(&spec.region)
            .with_context(|| format!("Failed to capture field {}", spec.name))?;
        self.extract_from_image(spec, &raw)
    }

    /// Reads every spec in order into a fresh snapshot.
    pub fn extract_all<C>(&self, specs: &[FieldSpec], capture: &mut C) -> Result<StatisticsSnapshot>
    where
        C: CaptureProvider + ?Sized,
    {
        let mut snapshot = StatisticsSnapshot::new();
        for spec in specs {
            let value = self.extract_field(spec, capture)?;
            snapshot.insert(spec.name.clone(), value);
        }
        Ok(snapshot)
    }

    fn prepare(&self, spec: &FieldSpec, capture: &RgbaImage) -> GrayImage {
        normalize(capture, spec.scale, spec.threshold, spec.invert)
    }
}
