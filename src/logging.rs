//! Console + file logger behind the `log` facade.
//!
//! Every record is printed with a local timestamp and appended to the main
//! log file. While a session log is active the same line also goes there.

use anyhow::{anyhow, Result};
use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

pub struct SessionLogger {
    level: Mutex<LevelFilter>,
    log_path: PathBuf,
    session_path: Mutex<Option<PathBuf>>,
}

impl SessionLogger {
    fn new(level: LevelFilter, log_path: PathBuf) -> Self {
        Self {
            level: Mutex::new(level),
            log_path,
            session_path: Mutex::new(None),
        }
    }
}

impl SessionLogger {
    fn set_level(&self, level: LevelFilter) {
        if let Ok(mut current) = self.level.lock() {
            *current = level;
        }
    }
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.level
            .lock()
            .map(|level| metadata.level() <= *level)
            .unwrap_or(true)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(record.level(), &record.args().to_string());
        print!("{}", line);
        append_line(&self.log_path, &line);

        if let Ok(session) = self.session_path.lock() {
            if let Some(path) = session.as_ref() {
                append_line(path, &line);
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// Formats one log line: `[HH:MM:SS.mmm] LEVEL message\n`.
fn format_line(level: log::Level, message: &str) -> String {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    format!("[{}] {:<5} {}\n", timestamp, level, message)
}

fn append_line(path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Installs the logger. Call once at startup.
pub fn init(level: LevelFilter, log_path: PathBuf) -> Result<()> {
    let logger = LOGGER.get_or_init(|| SessionLogger::new(level, log_path));
    log::set_logger(logger).map_err(|e| anyhow!("Failed to install logger: {}", e))?;
    log::set_max_level(level);
    Ok(())
}

/// Changes the level of the installed logger, e.g. once the config is read.
pub fn set_level(level: LevelFilter) {
    if let Some(logger) = LOGGER.get() {
        logger.set_level(level);
    }
    log::set_max_level(level);
}

/// Starts (Some) or stops (None) mirroring log lines into a session file.
pub fn set_session_log(path: Option<PathBuf>) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut session) = logger.session_path.lock() {
            *session = path;
        }
    }
}
