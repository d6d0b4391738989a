//! Core pipeline for img2html
//!
//! This crate turns an uploaded image into extracted text, cropped visual
//! elements and an HTML report. OCR and region finding are injected
//! through [`ocr::TextRecognizer`] and [`segment::RegionSegmenter`]; the
//! crate itself sequences the stages, crops and writes the elements, and
//! renders the report.

pub mod config;
pub mod error;
pub mod materialize;
pub mod ocr;
pub mod pipeline;
pub mod report;
pub mod segment;
pub mod sink;
pub mod types;

pub use config::{PipelineConfig, TesseractConfig};
pub use error::PipelineError;
pub use pipeline::{Extraction, Pipeline};
pub use sink::{CollectedErrors, ErrorSink, TracingSink};
pub use types::*;
