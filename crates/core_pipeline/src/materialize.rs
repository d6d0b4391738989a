//! Element materialization: crop each region and persist it as a PNG

use crate::error::{MaterializeError, PartialMaterialization};
use crate::sink::ErrorSink;
use crate::types::{Contour, VisualElement};
use image::DynamicImage;
use std::path::Path;

/// Crop every contour's bounding box out of `image` into `output_dir`
///
/// Files are named `element_<i>.png` after the contour's position in the
/// input. The directory is created if missing. The first failure stops the
/// run; elements written before it are returned inside the error.
pub fn materialize(
    image: &DynamicImage,
    contours: &[Contour],
    output_dir: &Path,
) -> Result<Vec<VisualElement>, PartialMaterialization> {
    let mut written = Vec::with_capacity(contours.len());

    if let Err(source) = std::fs::create_dir_all(output_dir) {
        return Err(PartialMaterialization {
            written,
            cause: MaterializeError::CreateDir {
                path: output_dir.to_path_buf(),
                source,
            },
        });
    }

    for (index, contour) in contours.iter().enumerate() {
        let bbox = match contour
            .bounding_box()
            .and_then(|b| b.clamp_to(image.width(), image.height()))
        {
            Some(bbox) => bbox,
            None => {
                return Err(PartialMaterialization {
                    written,
                    cause: MaterializeError::EmptyRegion { index },
                })
            }
        };

        let crop = image.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height);
        let path = output_dir.join(VisualElement::file_name(index));

        if let Err(source) = crop.save_with_format(&path, image::ImageFormat::Png) {
            return Err(PartialMaterialization {
                written,
                cause: MaterializeError::Write { path, source },
            });
        }

        tracing::debug!(index, ?bbox, path = %path.display(), "Element saved");
        written.push(VisualElement { index, bbox, path });
    }

    Ok(written)
}

/// Stage wrapper around [`materialize`] that never fails
///
/// With no source image there is nothing to crop. On failure a message goes
/// to `sink` and the elements written so far are kept.
pub fn save_visual_elements(
    image: Option<&DynamicImage>,
    contours: &[Contour],
    output_dir: &Path,
    sink: &dyn ErrorSink,
) -> Vec<VisualElement> {
    let Some(image) = image else {
        return Vec::new();
    };

    match materialize(image, contours, output_dir) {
        Ok(elements) => elements,
        Err(partial) => {
            sink.report_error(&format!(
                "An error occurred while saving visual elements: {}",
                partial.cause
            ));
            partial.written
        }
    }
}
