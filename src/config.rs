//! Runtime configuration.
//!
//! Loads settings from config.json at startup. Provides the OCR engine
//! location, the layout key, and the scan/match tuning values. The loaded
//! value is handed to constructors; nothing here is global.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::Point;

/// Panel scrolling and duplicate detection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum scroll+capture rounds before the scan is forced to stop
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Pause after each scroll so the panel stops moving (milliseconds)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Hamming distance below which two captures count as the same page
    #[serde(default = "default_duplicate_cutoff")]
    pub duplicate_cutoff: u32,
}

fn default_max_iterations() -> u32 {
    30
}

fn default_settle_ms() -> u64 {
    1000
}

fn default_duplicate_cutoff() -> u32 {
    2
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            settle_ms: default_settle_ms(),
            duplicate_cutoff: default_duplicate_cutoff(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Explicit tesseract executable; searched for when absent
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory; searched for when absent
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,
    /// Tesseract language pack
    #[serde(default = "default_language")]
    pub language: String,
    /// Layout key, "<width>x<height>" of the emulator window
    #[serde(default = "default_resolution")]
    pub resolution: String,
    /// Selects the event variant of panels that move during events
    #[serde(default)]
    pub events_active: bool,
    #[serde(default)]
    pub scan: ScanConfig,
    /// Overrides the layout's scroll drag start point
    #[serde(default)]
    pub scroll_start: Option<Point>,
    /// Overrides the layout's scroll drag end point
    #[serde(default)]
    pub scroll_end: Option<Point>,
    /// Normalized cross-correlation needed for a template probe to hit (0.0-1.0)
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    /// Statistics file; `<exe_dir>/stats/statistics.json` when absent
    #[serde(default)]
    pub stats_file: Option<PathBuf>,
    /// Artifact reference images; `<exe_dir>/resources/catalog` when absent
    #[serde(default)]
    pub catalog_dir: Option<PathBuf>,
    /// One of error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_resolution() -> String {
    "480x800".to_string()
}

fn default_match_threshold() -> f32 {
    0.9
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            language: default_language(),
            resolution: default_resolution(),
            events_active: false,
            scan: ScanConfig::default(),
            scroll_start: None,
            scroll_end: None,
            match_threshold: default_match_threshold(),
            stats_file: None,
            catalog_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn stats_path(&self) -> PathBuf {
        self.stats_file
            .clone()
            .unwrap_or_else(|| crate::paths::get_stats_dir().join("statistics.json"))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_dir
            .clone()
            .unwrap_or_else(crate::paths::get_catalog_dir)
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

/// Returns the default config location: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path`, or returns defaults when the file is
/// missing or unreadable.
pub fn load_config(path: &Path) -> AppConfig {
    info!("Looking for config at: {}", path.display());

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!("Config loaded from {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            }
        }
    } else {
        info!("{} not found. Using default config.", path.display());
    }

    AppConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json"));
        assert_eq!(config.resolution, "480x800");
        assert_eq!(config.scan.max_iterations, 30);
        assert_eq!(config.scan.duplicate_cutoff, 2);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "events_active": true, "scan": { "settle_ms": 250 }, "log_level": "debug" }"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert!(config.events_active);
        assert_eq!(config.scan.settle_ms, 250);
        assert_eq!(config.scan.max_iterations, 30);
        assert_eq!(config.language, "eng");
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&path);
        assert!(!config.events_active);
        assert!((config.match_threshold - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped: AppConfig = serde_json::from_str(include_str!("../config.json")).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(shipped.resolution, defaults.resolution);
        assert_eq!(shipped.language, defaults.language);
        assert_eq!(shipped.scan.max_iterations, defaults.scan.max_iterations);
        assert_eq!(shipped.scan.settle_ms, defaults.scan.settle_ms);
        assert_eq!(shipped.scan.duplicate_cutoff, defaults.scan.duplicate_cutoff);
        assert!((shipped.match_threshold - defaults.match_threshold).abs() < f32::EPSILON);
        assert_eq!(shipped.level_filter(), defaults.level_filter());
        assert!(shipped.tesseract_path.is_none());
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let config = AppConfig {
            log_level: "loud".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }
}
