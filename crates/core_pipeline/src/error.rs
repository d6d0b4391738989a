//! Error types for the extraction pipeline
//!
//! Stage errors ([`RecognitionError`], [`SegmentationError`],
//! [`PartialMaterialization`]) are absorbed at the stage boundary and turned
//! into messages for an [`crate::sink::ErrorSink`]. [`PipelineError`] covers
//! the request-level failures that leave nothing to process, plus cleanup.

use crate::types::VisualElement;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`crate::ocr::TextRecognizer`]
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The OCR engine ran and reported a failure of its own
    #[error("{engine} failed: {message}")]
    Engine { engine: String, message: String },

    /// Anything else: the engine could not be started, I/O, encoding
    #[error("{0}")]
    Unexpected(String),
}

/// Failure while thresholding or tracing contours
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("Failed to read image '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Materialization stopped early; `written` holds what made it to disk
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct PartialMaterialization {
    pub written: Vec<VisualElement>,
    pub cause: MaterializeError,
}

/// Reason a crop could not be persisted
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Failed to create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Contour {index} has no pixels inside the image")]
    EmptyRegion { index: usize },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Request-level failures returned from [`crate::pipeline::Pipeline::run`]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload does not carry a jpg/jpeg/png extension
    #[error("Unsupported upload '{filename}': expected a jpg, jpeg or png image")]
    UnsupportedUpload { filename: String },

    /// The upload bytes are not a decodable image
    #[error("Could not decode uploaded image '{filename}': {source}")]
    Decode {
        filename: String,
        #[source]
        source: image::ImageError,
    },

    /// Creating the request directory or writing the temporary input failed
    #[error("Failed to prepare '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A materialized element could not be read back for embedding
    #[error("Failed to read element '{path}': {source}")]
    ReadElement {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Deleting temporary files after the request failed
    #[error("Failed to remove temporary file '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// True if the client sent something unusable, as opposed to a server fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedUpload { .. } | PipelineError::Decode { .. }
        )
    }
}
