use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use super::types::OcrEngine;
use super::ExtractionError;

/// Tesseract driven through its command-line executable.
///
/// The image is piped on stdin and the recognized text read back from stdout,
/// so no temporary files are involved.
pub struct TesseractCli {
    command: PathBuf,
    default_lang: String,
}

impl TesseractCli {
    /// `command` is either an absolute path or a name looked up on PATH.
    pub fn new(command: &Path) -> Self {
        Self {
            command: command.to_path_buf(),
            default_lang: "spa".to_string(),
        }
    }

    /// Set language(s) for OCR (e.g., "spa", "spa+eng")
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.default_lang = langs.to_string();
        self
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    /// Probe the executable with `--version`.
    ///
    /// Only used for a startup diagnostic: a missing engine degrades every
    /// extraction to empty text, it does not stop the service.
    pub fn check_available(&self) -> Result<String, ExtractionError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ExtractionError::OcrInit(format!(
                "{} --version exited with {}",
                self.command.display(),
                output.status
            )));
        }

        // Older builds print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn spawn_error(&self, e: std::io::Error) -> ExtractionError {
        ExtractionError::OcrInit(format!(
            "failed to start {}: {e}",
            self.command.display()
        ))
    }
}

/// Stop an engine run that will not be read to completion and collect its exit status.
fn reap(child: &mut Child) {
    let _ = child.kill();
    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "Failed to reap OCR process");
    }
}

impl OcrEngine for TesseractCli {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        self.ocr_image_with_lang(image_bytes, &self.default_lang)
    }

    fn ocr_image_with_lang(
        &self,
        image_bytes: &[u8],
        lang: &str,
    ) -> Result<String, ExtractionError> {
        let mut child = Command::new(&self.command)
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The engine may exit before reading all input; its exit status says why.
            if let Err(e) = stdin.write_all(image_bytes) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    reap(&mut child);
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        "tesseract-cli"
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub failure: Option<String>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            failure: None,
        }
    }

    /// Engine whose every call fails with `OcrProcessing(reason)`.
    pub fn failing(reason: &str) -> Self {
        Self {
            text: String::new(),
            failure: Some(reason.to_string()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        self.ocr_image_with_lang(image_bytes, "spa")
    }

    fn ocr_image_with_lang(
        &self,
        _image_bytes: &[u8],
        _lang: &str,
    ) -> Result<String, ExtractionError> {
        match &self.failure {
            Some(reason) => Err(ExtractionError::OcrProcessing(reason.clone())),
            None => Ok(self.text.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
