//! OCR module
//!
//! Text recognition is an injected capability: the pipeline only sees the
//! [`TextRecognizer`] trait. The default engine is the Tesseract executable;
//! the `leptess` feature adds an in-process libtesseract binding.

use crate::config::TesseractConfig;
use crate::error::RecognitionError;
use crate::sink::ErrorSink;
use crate::types::TEXT_EXTRACTION_FAILED;
use image::DynamicImage;
use std::io::Write;
use std::process::{Command, Stdio};

/// Recognizes printed text in a whole image
pub trait TextRecognizer: Send + Sync {
    /// Raw recognized text, newline-delimited as the engine produced it
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError>;
}

/// Run OCR over the full image, absorbing any failure
///
/// The text is returned verbatim. On failure a message goes to `sink` and
/// [`TEXT_EXTRACTION_FAILED`] is returned so later stages still run.
pub fn extract_text(
    recognizer: &dyn TextRecognizer,
    image: &DynamicImage,
    sink: &dyn ErrorSink,
) -> String {
    match recognizer.recognize(image) {
        Ok(text) => {
            tracing::debug!(chars = text.len(), "Text extracted");
            text
        }
        Err(e @ RecognitionError::Engine { .. }) => {
            sink.report_error(&format!("An error occurred while extracting text: {}", e));
            TEXT_EXTRACTION_FAILED.to_string()
        }
        Err(e) => {
            sink.report_error(&format!(
                "An unexpected error occurred while extracting text: {}",
                e
            ));
            TEXT_EXTRACTION_FAILED.to_string()
        }
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, RecognitionError> {
    let mut png_bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut png_bytes);
    image
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| RecognitionError::Unexpected(format!("Failed to encode image as PNG: {}", e)))?;
    Ok(png_bytes)
}

/// Tesseract driven through its command-line executable
///
/// Runs `<command> stdin stdout -l <language>` and pipes a PNG in.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    config: TesseractConfig,
}

impl TesseractCli {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language);
        if let Some(dir) = &self.config.data_path {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new(TesseractConfig::default())
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError> {
        let png_bytes = encode_png(image)?;

        let mut child = self.command().spawn().map_err(|e| {
            RecognitionError::Unexpected(format!(
                "Failed to start '{}': {}. Is Tesseract installed?",
                self.config.command.display(),
                e
            ))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // The engine may exit before reading everything; its exit status says why.
            if let Err(e) = stdin.write_all(&png_bytes) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(RecognitionError::Unexpected(format!(
                        "Failed to pipe image to Tesseract: {}",
                        e
                    )));
                }
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            RecognitionError::Unexpected(format!("Failed to wait for Tesseract: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(RecognitionError::Engine {
                engine: "tesseract".to_string(),
                message,
            });
        }

        String::from_utf8(output.stdout).map_err(|e| {
            RecognitionError::Unexpected(format!("Tesseract returned invalid UTF-8: {}", e))
        })
    }
}

/// Tesseract linked in-process through leptess
#[cfg(feature = "leptess")]
#[derive(Debug, Clone)]
pub struct LeptessRecognizer {
    config: TesseractConfig,
}

#[cfg(feature = "leptess")]
impl LeptessRecognizer {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "leptess")]
impl TextRecognizer for LeptessRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError> {
        use leptess::LepTess;

        let data_path = self
            .config
            .data_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        // A fresh engine per call; LepTess is not shareable across threads.
        let mut tesseract = LepTess::new(data_path.as_deref(), &self.config.language).map_err(
            |e| RecognitionError::Engine {
                engine: "leptess".to_string(),
                message: format!("Failed to initialize Tesseract: {}", e),
            },
        )?;

        let png_bytes = encode_png(image)?;

        tesseract
            .set_image_from_mem(&png_bytes)
            .map_err(|e| RecognitionError::Engine {
                engine: "leptess".to_string(),
                message: format!("Failed to load image into Tesseract: {}", e),
            })?;

        tesseract
            .get_utf8_text()
            .map_err(|e| RecognitionError::Unexpected(format!("Tesseract output: {}", e)))
    }
}
