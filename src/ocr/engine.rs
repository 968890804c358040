use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::AppConfig;

/// Synchronous OCR over a normalized image.
///
/// `mode` is an opaque recognition configuration (page segmentation, engine
/// mode, character whitelists) handed to the engine as-is.
pub trait OcrEngine {
    fn recognize(&self, image: &GrayImage, mode: &str) -> Result<String>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for &T {
    fn recognize(&self, image: &GrayImage, mode: &str) -> Result<String> {
        (**self).recognize(image, mode)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for Box<T> {
    fn recognize(&self, image: &GrayImage, mode: &str) -> Result<String> {
        (**self).recognize(image, mode)
    }
}

/// Runs the tesseract command line tool.
///
/// The executable is resolved once, at construction, and kept on the engine.
#[derive(Clone, Debug)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            executable,
            tessdata,
            language: language.into(),
        }
    }

    /// Locates tesseract and its language data from the configured paths,
    /// falling back to the usual install locations.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
        // Tesseract has a compiled-in default; only pass one when we found it.
        let tessdata = match find_tessdata_dir(config.tessdata_dir.as_deref(), &config.language) {
            Ok(dir) => Some(dir),
            Err(e) => {
                log::warn!("{}; relying on tesseract's built-in tessdata location", e);
                None
            }
        };
        log::info!("Using tesseract at {}", executable.display());
        Ok(Self::new(executable, tessdata, config.language.clone()))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Builds the argument list: `<input> stdout [--tessdata-dir D] -l L <mode...>`.
    fn command_args(&self, input: &Path, mode: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.into(), "stdout".into()];
        if let Some(tessdata) = &self.tessdata {
            args.push("--tessdata-dir".into());
            args.push(tessdata.into());
        }
        args.push("-l".into());
        args.push(self.language.as_str().into());
        args.extend(mode.split_whitespace().map(OsString::from));
        args
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage, mode: &str) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image
            .save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let output = Command::new(&self.executable)
            .args(self.command_args(temp_input.path(), mode))
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_as_strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_command_args_with_tessdata() {
        let engine = TesseractEngine::new(
            PathBuf::from("tesseract"),
            Some(PathBuf::from("/data/tessdata")),
            "eng",
        );
        let args = args_as_strings(
            engine.command_args(Path::new("in.png"), "--psm 7 --oem 0 nobatch digits"),
        );
        assert_eq!(
            args,
            vec![
                "in.png",
                "stdout",
                "--tessdata-dir",
                "/data/tessdata",
                "-l",
                "eng",
                "--psm",
                "7",
                "--oem",
                "0",
                "nobatch",
                "digits"
            ]
        );
    }

    #[test]
    fn test_command_args_without_tessdata_or_mode() {
        let engine = TesseractEngine::new(PathBuf::from("tesseract"), None, "jpn");
        let args = args_as_strings(engine.command_args(Path::new("in.png"), "  "));
        assert_eq!(args, vec!["in.png", "stdout", "-l", "jpn"]);
    }

    #[test]
    fn test_missing_executable_is_an_error() {
        let engine = TesseractEngine::new(
            PathBuf::from("/nonexistent/titanstats/tesseract"),
            None,
            "eng",
        );
        let img = GrayImage::new(4, 4);
        assert!(engine.recognize(&img, "--psm 7").is_err());
    }
}
