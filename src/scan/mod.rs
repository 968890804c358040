//! Scrollable panel scanning.
//!
//! This module provides:
//! - Average-hash duplicate detection between captures
//! - The scroll-and-capture page collector
//! - Template presence probes and the parallel catalog matcher

pub mod dispatch;
pub mod matcher;
pub mod pages;
pub mod phash;

pub use dispatch::{load_catalog, match_catalog, merge_ownership, CatalogEntry, Ownership};
pub use matcher::{Matcher, TemplateMatcher};
pub use pages::{collect_pages, PagesSet, ScanEnd, ScanOptions};
pub use phash::{is_duplicate, within_cutoff};
