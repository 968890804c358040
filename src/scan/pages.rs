//! Collects every distinct scroll position of a panel.
//!
//! The scanner sequences through: Init → (Scroll → Capture → DuplicateCheck)* → Done.
//! It stops at the first capture that matches the previous page, or after
//! the iteration cap.

use anyhow::{Context, Result};
use image::GrayImage;
use log::{debug, info, warn};
use std::fmt;
use std::time::Duration;

use super::phash::{distance, within_cutoff, DEFAULT_CUTOFF};
use crate::capture::{CaptureProvider, CaptureRegion, Point, ScrollAction};
use crate::config::ScanConfig;
use crate::ocr::normalize;

/// Hard limit on scroll-and-capture rounds.
pub const DEFAULT_MAX_ITERATIONS: u32 = 30;

/// Pause after each scroll before capturing.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq)]
pub struct ScanOptions {
    pub max_iterations: u32,
    pub settle: Duration,
    pub cutoff: u32,
    pub scroll_start: Point,
    pub scroll_end: Point,
}

impl ScanOptions {
    pub fn new(scroll_start: Point, scroll_end: Point) -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            settle: DEFAULT_SETTLE,
            cutoff: DEFAULT_CUTOFF,
            scroll_start,
            scroll_end,
        }
    }

    pub fn from_config(config: &ScanConfig, scroll_start: Point, scroll_end: Point) -> Self {
        Self {
            max_iterations: config.max_iterations,
            settle: Duration::from_millis(config.settle_ms),
            cutoff: config.duplicate_cutoff,
            scroll_start,
            scroll_end,
        }
    }
}

/// Why a scan stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanEnd {
    /// The panel stopped changing
    Duplicate,
    /// Ran out of iterations without seeing a repeat
    IterationCap,
    /// The scroll collaborator failed mid-scan
    ScrollFailed,
    /// A capture after the first failed mid-scan
    CaptureFailed,
}

impl fmt::Display for ScanEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanEnd::Duplicate => write!(f, "reached a repeated page"),
            ScanEnd::IterationCap => write!(f, "hit the iteration cap"),
            ScanEnd::ScrollFailed => write!(f, "scroll failed"),
            ScanEnd::CaptureFailed => write!(f, "capture failed"),
        }
    }
}

/// Distinct pages of one panel, in scroll order.
#[derive(Clone, Debug)]
pub struct PagesSet {
    pub pages: Vec<GrayImage>,
    pub end: ScanEnd,
    /// Loop bodies run (scrolls attempted)
    pub iterations: u32,
}

impl PagesSet {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GrayImage> {
        self.pages.iter()
    }
}

/// Scanner states.
#[derive(Debug)]
enum ScanState {
    Init,
    Scroll,
    Capture,
    DuplicateCheck(GrayImage),
    Done(ScanEnd),
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Init => write!(f, "Init"),
            ScanState::Scroll => write!(f, "Scroll"),
            ScanState::Capture => write!(f, "Capture"),
            ScanState::DuplicateCheck(_) => write!(f, "Duplicate check"),
            ScanState::Done(end) => write!(f, "Done ({})", end),
        }
    }
}

fn grab<C: CaptureProvider + ?Sized>(capture: &mut C, region: &CaptureRegion) -> Result<GrayImage> {
    let raw = capture.capture(region)?;
    Ok(normalize(&raw, 1.0, None, false))
}

/// Scrolls through a panel collecting each distinct page.
///
/// Only a failure of the very first capture is an error; anything after that
/// ends the scan with the pages gathered so far. Runs at most
/// `options.max_iterations` scroll rounds.
pub fn collect_pages<S, C>(
    scroll: &mut S,
    capture: &mut C,
    region: &CaptureRegion,
    options: &ScanOptions,
) -> Result<PagesSet>
where
    S: ScrollAction + ?Sized,
    C: CaptureProvider + ?Sized,
{
    let mut pages: Vec<GrayImage> = Vec::new();
    let mut iterations = 0u32;
    let mut state = ScanState::Init;

    let end = loop {
        debug!("Scan state: {}", state);
        state = match state {
            ScanState::Init => {
                let first = grab(capture, region).context("Failed to capture first page")?;
                pages.push(first);
                ScanState::Scroll
            }
            ScanState::Scroll => {
                if iterations >= options.max_iterations {
                    warn!(
                        "Scan stopped after {} scrolls without a repeated page",
                        iterations
                    );
                    ScanState::Done(ScanEnd::IterationCap)
                } else {
                    iterations += 1;
                    match scroll.scroll(options.scroll_start, options.scroll_end) {
                        Ok(()) => {
                            scroll.settle(options.settle);
                            ScanState::Capture
                        }
                        Err(e) => {
                            warn!("Scroll {} failed: {:#}", iterations, e);
                            ScanState::Done(ScanEnd::ScrollFailed)
                        }
                    }
                }
            }
            ScanState::Capture => match grab(capture, region) {
                Ok(page) => ScanState::DuplicateCheck(page),
                Err(e) => {
                    warn!("Capture after scroll {} failed: {:#}", iterations, e);
                    ScanState::Done(ScanEnd::CaptureFailed)
                }
            },
            ScanState::DuplicateCheck(page) => {
                // Only the last accepted page matters
                let repeated = pages.last().is_some_and(|last| {
                    let d = distance(last, &page);
                    debug!("Page {} distance to previous: {}", pages.len() + 1, d);
                    within_cutoff(d, options.cutoff)
                });
                if repeated {
                    ScanState::Done(ScanEnd::Duplicate)
                } else {
                    pages.push(page);
                    ScanState::Scroll
                }
            }
            ScanState::Done(end) => break end,
        };
    };

    info!(
        "Collected {} pages in {} scrolls ({})",
        pages.len(),
        iterations,
        end
    );

    Ok(PagesSet {
        pages,
        end,
        iterations,
    })
}
