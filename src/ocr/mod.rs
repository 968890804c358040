pub mod coerce;
pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use coerce::{coerce, coerce_field, CoercionKind, DIGITS_FALLBACK};
pub use engine::{OcrEngine, TesseractEngine};
pub use extract::FieldExtractor;
pub use preprocess::normalize;
