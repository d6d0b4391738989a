//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Contours enclosing this many pixels² or fewer are treated as noise
pub const DEFAULT_MIN_AREA: f64 = 1000.0;

/// Directory (inside each request directory) that receives element crops
pub const ELEMENTS_DIR: &str = "output_elements";

/// Configuration for the Tesseract OCR engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// Tesseract executable (default: `tesseract`, resolved through PATH)
    pub command: PathBuf,
    /// Recognition language (default: eng)
    pub language: String,
    /// Directory holding `*.traineddata`; engine default when unset
    pub data_path: Option<PathBuf>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            data_path: None,
        }
    }
}

/// Configuration for a [`crate::pipeline::Pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Parent directory for per-request working directories
    pub work_root: PathBuf,
    /// Area floor for the contour filter, in pixels²
    pub min_area: f64,
    /// OCR engine settings
    pub tesseract: TesseractConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("img2html"),
            min_area: DEFAULT_MIN_AREA,
            tesseract: TesseractConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.min_area, 1000.0);
        assert!(config.work_root.ends_with("img2html"));
        assert_eq!(config.tesseract.command, PathBuf::from("tesseract"));
        assert_eq!(config.tesseract.language, "eng");
        assert!(config.tesseract.data_path.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"min_area\": 1000.0"));
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
