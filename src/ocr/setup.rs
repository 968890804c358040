use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

const COMMON_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Returns the per-user directory for a private tesseract install.
pub fn get_user_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("titanstats")
        .join("tesseract")
}

/// Finds the tesseract executable.
///
/// Order: configured path, `<exe_dir>/tesseract`, the per-user install,
/// `PATH`, then common install locations. A configured path that does not
/// exist is an error rather than a silent fallback.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!(
            "Configured tesseract not found at {}",
            path.display()
        ));
    }

    for dir in [crate::paths::get_tesseract_dir(), get_user_tesseract_dir()] {
        let local_exe = dir.join(EXECUTABLE_NAME);
        if local_exe.exists() {
            return Ok(local_exe);
        }
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory holding `<language>.traineddata`.
pub fn find_tessdata_dir(configured: Option<&Path>, language: &str) -> Result<PathBuf> {
    let traineddata = format!("{}.traineddata", language);
    let has_language = |dir: &Path| dir.join(&traineddata).exists();

    if let Some(dir) = configured {
        if has_language(dir) {
            return Ok(dir.to_path_buf());
        }
        return Err(anyhow!(
            "Configured tessdata directory {} has no {}",
            dir.display(),
            traineddata
        ));
    }

    let mut candidates = vec![
        crate::paths::get_tesseract_dir().join("tessdata"),
        get_user_tesseract_dir().join("tessdata"),
    ];

    // Check TESSDATA_PREFIX environment variable
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        candidates.push(prefix.join("tessdata"));
        candidates.push(prefix);
    }

    candidates.extend(COMMON_TESSDATA.iter().map(PathBuf::from));

    candidates
        .into_iter()
        .find(|dir| has_language(dir))
        .ok_or_else(|| anyhow!("tessdata directory not found. Please ensure {} is available.", traineddata))
}
