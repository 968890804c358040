//! titanstats command line.
//!
//! Runs the statistics pipeline against screenshots on disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use titanstats::capture::{SequenceCapture, StillCapture};
use titanstats::config::{default_config_path, load_config, AppConfig};
use titanstats::layout::Layout;
use titanstats::ocr::{FieldExtractor, TesseractEngine};
use titanstats::scan::{
    collect_pages, load_catalog, match_catalog, merge_ownership, ScanOptions, TemplateMatcher,
};
use titanstats::stats::{diff_all, StatisticsSnapshot, StatsTracker};
use titanstats::store::{JsonStore, Persistence};
use titanstats::{logging, paths};

#[derive(Parser)]
#[command(name = "titanstats", version, about = "Read game statistics from screenshots")]
struct Cli {
    /// Config file; defaults to config.json next to the executable
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the stats panel from a screenshot, store it and print the deltas
    Stats {
        /// Full window screenshot with the stats panel open
        screenshot: PathBuf,
    },
    /// Scan ordered artifact panel captures and mark found artifacts owned
    Pages {
        /// Directory of PNG captures, one per scroll position, in name order
        dir: PathBuf,
    },
    /// Print per-field deltas between two snapshot files
    Diff { old: PathBuf, new: PathBuf },
}

fn main() {
    install_panic_hook();

    if let Err(err) = run() {
        error!("{}", err);
        for cause in err.chain().skip(1) {
            error!("caused by: {}", cause);
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    paths::ensure_directories().context("Failed to create output directories")?;
    // Installed before the config is read so its warnings are not lost
    logging::init(
        log::LevelFilter::Info,
        paths::get_logs_dir().join("titanstats.log"),
    )?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path);
    logging::set_level(config.level_filter());
    info!("=== titanstats {} ===", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    match cli.command {
        Commands::Stats { screenshot } => run_stats(&config, &screenshot),
        Commands::Pages { dir } => run_pages(&config, &dir),
        Commands::Diff { old, new } => run_diff(&old, &new),
    }
}

fn run_stats(config: &AppConfig, screenshot: &Path) -> Result<()> {
    let layout = Layout::builtin(&config.resolution, config.events_active)?;
    let capture = StillCapture::open(screenshot)?;
    let engine = TesseractEngine::from_config(config)?;
    let store = JsonStore::open(&config.stats_path())?;

    let mut tracker = StatsTracker::new(layout, capture, FieldExtractor::new(engine), store)?;
    tracker.attach_session_log(&paths::get_logs_dir());
    tracker.update_stats()?;

    println!("{}", serde_json::to_string_pretty(&tracker.deltas())?);
    tracker.finish_session()?;
    Ok(())
}

fn run_pages(config: &AppConfig, dir: &Path) -> Result<()> {
    let layout = Layout::builtin(&config.resolution, config.events_active)?;
    let mut capture = SequenceCapture::open_dir(dir)?;
    if capture.is_empty() {
        anyhow::bail!("No PNG captures in {}", dir.display());
    }
    let mut scroll = capture.scroller();

    let options = ScanOptions::from_config(
        &config.scan,
        config.scroll_start.unwrap_or(layout.scroll_start),
        config.scroll_end.unwrap_or(layout.scroll_end),
    );
    let pages = collect_pages(&mut scroll, &mut capture, &layout.artifact_region, &options)?;

    let catalog = load_catalog(&config.catalog_path())?;
    let mut store = JsonStore::open(&config.stats_path())?;
    let mut ownership = store.load_ownership()?;
    let matcher = TemplateMatcher::new(config.match_threshold);

    let found = match_catalog(&pages.pages, &catalog, &ownership, &matcher)?;
    let newly_owned = merge_ownership(&found, &mut ownership, &mut store)?;
    info!(
        "{} pages ({}), {} found, {} newly owned",
        pages.len(),
        pages.end,
        found.len(),
        newly_owned.len()
    );

    let names: BTreeSet<&str> = found.iter().map(String::as_str).collect();
    println!("{}", serde_json::to_string_pretty(&names)?);
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<StatisticsSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a snapshot", path.display()))
}

fn run_diff(old: &Path, new: &Path) -> Result<()> {
    let deltas = diff_all(&read_snapshot(old)?, &read_snapshot(new)?);
    println!("{}", serde_json::to_string_pretty(&deltas)?);
    Ok(())
}

/// Logs panics through the installed logger as well as stderr.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();

        eprintln!("[PANIC]{} {}", location, msg);
        error!("[PANIC]{} {}", location, msg);
    }));
}
