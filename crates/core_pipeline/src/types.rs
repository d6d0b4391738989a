//! Core types for the img2html pipeline
//!
//! This module defines the artifacts that flow between the pipeline stages:
//! uploads, traced contours, bounding boxes and materialized elements.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Placeholder returned in place of OCR output when recognition fails
pub const TEXT_EXTRACTION_FAILED: &str = "Text extraction failed. Please try again.";

/// Image extensions accepted from the upload shell
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Unique identifier for a single extraction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An image as received from the upload shell
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename supplied by the client
    pub filename: String,
    /// Raw encoded bytes (JPEG or PNG)
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read an upload from disk, keeping only the file name component
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }

    /// Lowercased extension of the uploaded filename, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// True if the filename carries one of the accepted image extensions
    pub fn has_accepted_extension(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Filename reduced to characters that are safe inside a single path component
    pub fn sanitized_filename(&self) -> String {
        let name = Path::new(&self.filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cleaned: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.trim_matches('.').is_empty() {
            "upload".to_string()
        } else {
            cleaned
        }
    }
}

/// An integer pixel coordinate on a traced contour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Outer boundary of one connected foreground region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour {
    /// Boundary points in tracing order
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Area enclosed by the traced polygon (shoelace formula)
    ///
    /// The polygon runs through pixel centres, so a solid `w x h` block
    /// yields `(w - 1) * (h - 1)`. Degenerate contours have zero area.
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let doubled: i64 = self
            .points
            .iter()
            .zip(self.points.iter().cycle().skip(1))
            .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
            .sum();
        doubled.abs() as f64 / 2.0
    }

    /// Minimal axis-aligned rectangle containing every point
    ///
    /// Returns `None` for an empty contour. Width and height count pixels
    /// inclusively, so a single point yields a 1x1 box.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let x = min_x.max(0);
        let y = min_y.max(0);
        if max_x < x || max_y < y {
            return None;
        }
        Some(BoundingBox {
            x: x as u32,
            y: y as u32,
            width: (max_x - x + 1) as u32,
            height: (max_y - y + 1) as u32,
        })
    }
}

/// Axis-aligned rectangle in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Shrink the box so it lies entirely within a `width x height` image
    ///
    /// Returns `None` if nothing of the box remains inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(BoundingBox {
            x: self.x,
            y: self.y,
            width: w,
            height: h,
        })
    }

    /// True if the box is non-empty and fits inside a `width x height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// A cropped region of the source image persisted to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualElement {
    /// Zero-based position in the filtered contour sequence
    pub index: usize,
    /// Region of the source image this crop covers
    pub bbox: BoundingBox,
    /// Location of the written PNG
    pub path: PathBuf,
}

impl VisualElement {
    /// File name used for the element at `index`
    pub fn file_name(index: usize) -> String {
        format!("element_{}.png", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle(x: i32, y: i32, w: i32, h: i32) -> Contour {
        let mut points = Vec::new();
        for i in 0..w {
            points.push(Point::new(x + i, y));
        }
        for j in 1..h {
            points.push(Point::new(x + w - 1, y + j));
        }
        for i in (0..w - 1).rev() {
            points.push(Point::new(x + i, y + h - 1));
        }
        for j in (1..h - 1).rev() {
            points.push(Point::new(x, y + j));
        }
        Contour::new(points)
    }

    #[test]
    fn test_request_id_creation() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_contour_area_of_traced_square() {
        let contour = rectangle(10, 10, 50, 50);
        assert_eq!(contour.area(), 49.0 * 49.0);
    }

    #[test]
    fn test_contour_area_degenerate() {
        assert_eq!(Contour::new(vec![]).area(), 0.0);
        let line = Contour::new(vec![Point::new(0, 0), Point::new(5, 0)]);
        assert_eq!(line.area(), 0.0);
    }

    #[test]
    fn test_bounding_box_is_inclusive() {
        let bbox = rectangle(10, 20, 50, 30).bounding_box().unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x: 10,
                y: 20,
                width: 50,
                height: 30
            }
        );
    }

    #[test]
    fn test_bounding_box_empty_contour() {
        assert!(Contour::new(vec![]).bounding_box().is_none());
    }

    #[test]
    fn test_clamp_to_image() {
        let bbox = BoundingBox {
            x: 90,
            y: 5,
            width: 20,
            height: 10,
        };
        let clamped = bbox.clamp_to(100, 100).unwrap();
        assert_eq!(clamped.width, 10);
        assert!(clamped.fits_within(100, 100));
        assert!(bbox.clamp_to(50, 50).is_none());
    }

    #[test]
    fn test_upload_extension_filter() {
        assert!(Upload::new("scan.PNG", vec![]).has_accepted_extension());
        assert!(Upload::new("photo.jpeg", vec![]).has_accepted_extension());
        assert!(!Upload::new("notes.gif", vec![]).has_accepted_extension());
        assert!(!Upload::new("README", vec![]).has_accepted_extension());
    }

    #[test]
    fn test_sanitized_filename() {
        let upload = Upload::new("../../etc/my scan<1>.png", vec![]);
        assert_eq!(upload.sanitized_filename(), "my_scan_1_.png");
        assert_eq!(Upload::new("..", vec![]).sanitized_filename(), "upload");
    }

    #[test]
    fn test_visual_element_serialization() {
        let element = VisualElement {
            index: 0,
            bbox: BoundingBox {
                x: 1,
                y: 2,
                width: 3,
                height: 4,
            },
            path: PathBuf::from("output_elements/element_0.png"),
        };
        let json = serde_json::to_string(&element).unwrap();
        assert!(json.contains("\"width\":3"));
        assert_eq!(VisualElement::file_name(7), "element_7.png");
    }
}
