//! Visual element segmentation
//!
//! Classical foreground isolation for scanned or photographed pages:
//! - Grayscale conversion
//! - Global Otsu thresholding, inverted so dark ink is foreground
//! - Outer contour tracing (holes are not separate regions)
//! - Area filtering against a fixed noise floor

use crate::config::DEFAULT_MIN_AREA;
use crate::error::SegmentationError;
use crate::sink::ErrorSink;
use crate::types::{Contour, Point};
use image::{imageops, DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use std::path::Path;

/// Finds the regions of an image worth cropping out
pub trait RegionSegmenter: Send + Sync {
    /// Contours of the surviving regions, in discovery order
    fn find_regions(&self, image: &DynamicImage) -> Result<Vec<Contour>, SegmentationError>;
}

/// Result of the segmentation stage
///
/// `image` is `None` when the source could not be read; `contours` is then
/// empty.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub image: Option<DynamicImage>,
    pub contours: Vec<Contour>,
}

/// Otsu binarization followed by external contour tracing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtsuContourSegmenter {
    /// Contours enclosing this area (pixels²) or less are dropped
    pub min_area: f64,
}

impl OtsuContourSegmenter {
    pub fn new(min_area: f64) -> Self {
        Self { min_area }
    }
}

impl Default for OtsuContourSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_AREA)
    }
}

impl RegionSegmenter for OtsuContourSegmenter {
    fn find_regions(&self, image: &DynamicImage) -> Result<Vec<Contour>, SegmentationError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(SegmentationError::EmptyImage { width, height });
        }

        let binary = binarize(image);
        let traced = external_contours(&binary);
        let total = traced.len();

        let kept: Vec<Contour> = traced
            .into_iter()
            .filter(|c| c.area() > self.min_area)
            .collect();

        tracing::debug!(
            traced = total,
            kept = kept.len(),
            min_area = self.min_area,
            "Contours filtered"
        );
        Ok(kept)
    }
}

/// Grayscale + inverted Otsu threshold: foreground pixels are 255
///
/// A uniform image is all foreground if it is black and all background
/// otherwise.
pub fn binarize(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();

    let mut pixels = gray.pixels().map(|p| p[0]);
    let first = pixels.next();
    if first.is_none() || pixels.all(|v| Some(v) == first) {
        let fill = if first == Some(0) { 255 } else { 0 };
        return GrayImage::from_pixel(gray.width(), gray.height(), Luma([fill]));
    }

    let level = otsu_level(&gray);
    threshold(&gray, level, ThresholdType::BinaryInverted)
}

/// Outermost outer borders of the foreground in a binary image
///
/// Regions nested inside a hole of another region are not returned.
pub fn external_contours(binary: &GrayImage) -> Vec<Contour> {
    // Border tracing needs background at (0, 0), so trace a copy framed by
    // one pixel of background and shift the points back.
    let mut framed = GrayImage::new(binary.width() + 2, binary.height() + 2);
    imageops::replace(&mut framed, binary, 1, 1);

    find_contours::<i32>(&framed)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            Contour::new(
                c.points
                    .iter()
                    .map(|p| Point::new(p.x - 1, p.y - 1))
                    .collect(),
            )
        })
        .collect()
}

/// Load the image at `path` and find its regions, absorbing any failure
///
/// On failure a message goes to `sink` and an empty [`Segmentation`] is
/// returned, so materialization simply has nothing to do.
pub fn segment_visual_elements(
    segmenter: &dyn RegionSegmenter,
    path: &Path,
    sink: &dyn ErrorSink,
) -> Segmentation {
    match load_and_segment(segmenter, path) {
        Ok(segmentation) => segmentation,
        Err(e) => {
            sink.report_error(&format!(
                "An error occurred while segmenting visual elements: {}",
                e
            ));
            Segmentation::default()
        }
    }
}

fn load_and_segment(
    segmenter: &dyn RegionSegmenter,
    path: &Path,
) -> Result<Segmentation, SegmentationError> {
    let reader = image::ImageReader::open(path).map_err(|source| SegmentationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = reader
        .with_guessed_format()
        .map_err(|source| SegmentationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let image = reader.decode().map_err(|source| SegmentationError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let contours = segmenter.find_regions(&image)?;
    Ok(Segmentation {
        image: Some(image),
        contours,
    })
}
