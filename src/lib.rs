//! Screen statistics for an idle game bot.
//!
//! Captured screen regions are normalized and run through OCR, the text is
//! coerced into typed statistics, and each update is diffed against the
//! stored baseline. Scrollable panels are scanned page by page and matched
//! against a catalog of reference images in parallel.

pub mod capture;
pub mod config;
pub mod layout;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod scan;
pub mod stats;
pub mod store;
