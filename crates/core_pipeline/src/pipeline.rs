//! Request pipeline: upload -> text -> regions -> crops -> report
//!
//! Each request gets its own directory under the configured work root, so
//! two uploads with the same filename never share temporary paths. Stages
//! run once, in order; stage failures go to the [`ErrorSink`] and the run
//! continues with whatever the stage could produce.

use crate::config::{PipelineConfig, ELEMENTS_DIR};
use crate::error::PipelineError;
use crate::materialize::save_visual_elements;
use crate::ocr::{extract_text, TesseractCli, TextRecognizer};
use crate::report;
use crate::segment::{segment_visual_elements, OtsuContourSegmenter, RegionSegmenter};
use crate::sink::ErrorSink;
use crate::types::{RequestId, Upload, VisualElement};
use std::path::{Path, PathBuf};

/// Working directory owned by a single request
#[derive(Debug)]
pub struct RequestDir {
    id: RequestId,
    path: PathBuf,
}

impl RequestDir {
    /// Create `<root>/<uuid>/`
    pub fn create(root: &Path) -> Result<Self, PipelineError> {
        let id = RequestId::new();
        let path = root.join(id.to_string());
        std::fs::create_dir_all(&path).map_err(|source| PipelineError::Workspace {
            path: path.clone(),
            source,
        })?;
        Ok(Self { id, path })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the temporary copy of the upload lives
    pub fn input_path(&self, upload: &Upload) -> PathBuf {
        self.path.join(format!("temp_{}", upload.sanitized_filename()))
    }

    /// Where element crops are written
    pub fn elements_dir(&self) -> PathBuf {
        self.path.join(ELEMENTS_DIR)
    }
}

/// Everything one request produced
///
/// Element files stay on disk until [`Extraction::cleanup`] is called.
#[derive(Debug)]
pub struct Extraction {
    /// OCR output or the failure placeholder
    pub text: String,
    /// Materialized crops in contour order
    pub elements: Vec<VisualElement>,
    /// Report referencing the crops relative to the request directory
    pub html: String,
    input_path: PathBuf,
    dir: RequestDir,
}

impl Extraction {
    pub fn id(&self) -> RequestId {
        self.dir.id()
    }

    pub fn request_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Element paths relative to the request directory
    pub fn relative_element_paths(&self) -> Vec<PathBuf> {
        relative_paths(self.dir.path(), &self.elements)
    }

    /// PNG bytes of each element, in order
    pub fn element_pngs(&self) -> Result<Vec<Vec<u8>>, PipelineError> {
        self.elements
            .iter()
            .map(|element| {
                std::fs::read(&element.path).map_err(|source| PipelineError::ReadElement {
                    path: element.path.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Self-contained report with every element inlined
    pub fn embedded_html(&self) -> Result<String, PipelineError> {
        Ok(report::render_embedded(&self.text, &self.element_pngs()?))
    }

    /// Delete the temporary input, every element file and the request directory
    ///
    /// Unlike stage failures, a cleanup failure is returned to the caller.
    pub fn cleanup(self) -> Result<(), PipelineError> {
        remove_file(&self.input_path)?;
        for element in &self.elements {
            remove_file(&element.path)?;
        }
        std::fs::remove_dir_all(self.dir.path()).map_err(|source| PipelineError::Cleanup {
            path: self.dir.path().to_path_buf(),
            source,
        })?;
        tracing::debug!(request = %self.dir.id(), "Temporary files removed");
        Ok(())
    }
}

fn remove_file(path: &Path) -> Result<(), PipelineError> {
    std::fs::remove_file(path).map_err(|source| PipelineError::Cleanup {
        path: path.to_path_buf(),
        source,
    })
}

fn relative_paths(base: &Path, elements: &[VisualElement]) -> Vec<PathBuf> {
    elements
        .iter()
        .map(|e| {
            e.path
                .strip_prefix(base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| e.path.clone())
        })
        .collect()
}

/// The four-stage extraction pipeline with injected engines
pub struct Pipeline {
    config: PipelineConfig,
    recognizer: Box<dyn TextRecognizer>,
    segmenter: Box<dyn RegionSegmenter>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        recognizer: Box<dyn TextRecognizer>,
        segmenter: Box<dyn RegionSegmenter>,
    ) -> Self {
        Self {
            config,
            recognizer,
            segmenter,
        }
    }

    /// Tesseract executable + Otsu segmenter, both configured from `config`
    pub fn from_config(config: PipelineConfig) -> Self {
        let recognizer = Box::new(TesseractCli::new(config.tesseract.clone()));
        let segmenter = Box::new(OtsuContourSegmenter::new(config.min_area));
        Self::new(config, recognizer, segmenter)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one upload
    ///
    /// Errors are returned only when there is nothing to process (bad
    /// extension, undecodable bytes, unusable work root). Everything after
    /// that is reported through `sink`.
    pub fn run(&self, upload: &Upload, sink: &dyn ErrorSink) -> Result<Extraction, PipelineError> {
        if !upload.has_accepted_extension() {
            return Err(PipelineError::UnsupportedUpload {
                filename: upload.filename.clone(),
            });
        }

        let image = image::load_from_memory(&upload.bytes).map_err(|source| {
            PipelineError::Decode {
                filename: upload.filename.clone(),
                source,
            }
        })?;

        let dir = RequestDir::create(&self.config.work_root)?;
        let input_path = dir.input_path(upload);
        if let Err(source) = std::fs::write(&input_path, &upload.bytes) {
            if let Err(e) = std::fs::remove_dir_all(dir.path()) {
                tracing::warn!("Failed to remove {}: {}", dir.path().display(), e);
            }
            return Err(PipelineError::Workspace {
                path: input_path,
                source,
            });
        }

        tracing::info!(
            request = %dir.id(),
            filename = %upload.filename,
            width = image.width(),
            height = image.height(),
            "Processing upload"
        );

        let text = extract_text(self.recognizer.as_ref(), &image, sink);

        let segmentation = segment_visual_elements(self.segmenter.as_ref(), &input_path, sink);

        let elements = save_visual_elements(
            segmentation.image.as_ref(),
            &segmentation.contours,
            &dir.elements_dir(),
            sink,
        );

        let html = report::render(&text, &relative_paths(dir.path(), &elements));

        tracing::info!(
            request = %dir.id(),
            chars = text.len(),
            elements = elements.len(),
            "Extraction complete"
        );

        Ok(Extraction {
            text,
            elements,
            html,
            input_path,
            dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::segment::tests::canvas_with_blocks;
    use crate::sink::CollectedErrors;
    use crate::types::{Contour, Point, TEXT_EXTRACTION_FAILED};
    use image::DynamicImage;

    struct FixedText(&'static str);

    impl TextRecognizer for FixedText {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, RecognitionError> {
            Ok(self.0.to_string())
        }
    }

    struct EngineFailure;

    impl TextRecognizer for EngineFailure {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, RecognitionError> {
            Err(RecognitionError::Engine {
                engine: "fake".to_string(),
                message: "tesseract crashed".to_string(),
            })
        }
    }

    /// Returns the same contours for any image
    struct FixedRegions(Vec<Contour>);

    impl RegionSegmenter for FixedRegions {
        fn find_regions(
            &self,
            _image: &DynamicImage,
        ) -> Result<Vec<Contour>, crate::error::SegmentationError> {
            Ok(self.0.clone())
        }
    }

    fn png_upload(name: &str, image: &DynamicImage) -> Upload {
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        Upload::new(name, bytes)
    }

    fn pipeline(
        work_root: &Path,
        recognizer: impl TextRecognizer + 'static,
        segmenter: impl RegionSegmenter + 'static,
    ) -> Pipeline {
        let config = PipelineConfig {
            work_root: work_root.to_path_buf(),
            ..PipelineConfig::default()
        };
        Pipeline::new(config, Box::new(recognizer), Box::new(segmenter))
    }

    #[test]
    fn test_blank_page_produces_empty_report() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText(""), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let upload = png_upload("blank.png", &canvas_with_blocks(100, 100, &[]));
        let extraction = p.run(&upload, &sink).unwrap();

        assert!(sink.is_empty());
        assert!(extraction.text.trim().is_empty());
        assert!(extraction.elements.is_empty());
        assert_eq!(extraction.html, "<html><body><p></p></body></html>");
        extraction.cleanup().unwrap();
    }

    #[test]
    fn test_two_squares_yield_one_element() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText("Logo"), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let img = canvas_with_blocks(200, 200, &[(20, 20, 50, 50), (120, 120, 20, 25)]);
        let extraction = p.run(&png_upload("squares.png", &img), &sink).unwrap();

        assert_eq!(extraction.elements.len(), 1);
        assert!(extraction.elements[0].path.ends_with("element_0.png"));
        assert!(extraction.elements[0].path.is_file());
        assert_eq!(
            extraction.relative_element_paths(),
            vec![PathBuf::from("output_elements/element_0.png")]
        );
        assert_eq!(
            extraction.html,
            "<html><body><p>Logo</p><img src=\"output_elements/element_0.png\" /></body></html>"
        );
        extraction.cleanup().unwrap();
    }

    #[test]
    fn test_ocr_failure_still_reports_elements() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), EngineFailure, OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let img = canvas_with_blocks(200, 200, &[(20, 20, 50, 50)]);
        let extraction = p.run(&png_upload("photo.png", &img), &sink).unwrap();

        assert_eq!(extraction.text, TEXT_EXTRACTION_FAILED);
        assert_eq!(extraction.elements.len(), 1);
        assert!(extraction
            .html
            .contains("<p>Text extraction failed. Please try again.</p>"));
        assert!(extraction.html.contains("element_0.png"));
        assert_eq!(sink.len(), 1);
        extraction.cleanup().unwrap();
    }

    #[test]
    fn test_injected_segmenter_drives_materialization() {
        let root = tempfile::tempdir().unwrap();
        let regions = vec![
            Contour::new(vec![Point::new(5, 5), Point::new(14, 5), Point::new(14, 14)]),
            Contour::new(vec![Point::new(0, 0), Point::new(3, 7)]),
        ];
        let p = pipeline(root.path(), FixedText("x"), FixedRegions(regions));
        let sink = CollectedErrors::new();

        let extraction = p
            .run(&png_upload("fake.png", &canvas_with_blocks(20, 20, &[])), &sink)
            .unwrap();

        assert_eq!(extraction.elements.len(), 2);
        assert_eq!(extraction.elements[0].bbox.width, 10);
        assert_eq!(extraction.elements[1].bbox.height, 8);
        assert_eq!(extraction.element_pngs().unwrap().len(), 2);
        extraction.cleanup().unwrap();
    }

    #[test]
    fn test_embedded_html_inlines_elements() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText("a&b"), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let img = canvas_with_blocks(200, 200, &[(20, 20, 50, 50), (100, 100, 40, 40)]);
        let extraction = p.run(&png_upload("two.png", &img), &sink).unwrap();
        let html = extraction.embedded_html().unwrap();

        assert!(html.starts_with("<html><body><p>a&amp;b</p>"));
        assert_eq!(html.matches("data:image/png;base64,").count(), 2);
        extraction.cleanup().unwrap();
    }

    #[test]
    fn test_same_filename_gets_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText(""), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();
        let upload = png_upload("scan.png", &canvas_with_blocks(30, 30, &[]));

        let first = p.run(&upload, &sink).unwrap();
        let second = p.run(&upload, &sink).unwrap();

        assert_ne!(first.id(), second.id());
        assert_ne!(first.input_path(), second.input_path());
        assert!(first.input_path().ends_with("temp_scan.png"));
        first.cleanup().unwrap();
        second.cleanup().unwrap();
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText(""), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let img = canvas_with_blocks(200, 200, &[(20, 20, 50, 50)]);
        let extraction = p.run(&png_upload("squares.png", &img), &sink).unwrap();
        let dir = extraction.request_dir().to_path_buf();
        let element = extraction.elements[0].path.clone();
        assert!(dir.is_dir());

        extraction.cleanup().unwrap();

        assert!(!element.exists());
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cleanup_failure_is_returned() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText(""), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let extraction = p
            .run(&png_upload("gone.png", &canvas_with_blocks(30, 30, &[])), &sink)
            .unwrap();
        std::fs::remove_file(extraction.input_path()).unwrap();

        let err = extraction.cleanup().unwrap_err();
        assert!(matches!(err, PipelineError::Cleanup { .. }));
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText(""), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let upload = png_upload("drawing.gif", &canvas_with_blocks(30, 30, &[]));
        let err = p.run(&upload, &sink).unwrap_err();

        assert!(matches!(err, PipelineError::UnsupportedUpload { .. }));
        assert!(err.is_client_error());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rejects_undecodable_upload() {
        let root = tempfile::tempdir().unwrap();
        let p = pipeline(root.path(), FixedText(""), OtsuContourSegmenter::default());
        let sink = CollectedErrors::new();

        let err = p
            .run(&Upload::new("broken.jpg", b"not a jpeg".to_vec()), &sink)
            .unwrap_err();

        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_from_config_uses_min_area() {
        let config = PipelineConfig {
            min_area: 10.0,
            ..PipelineConfig::default()
        };
        let p = Pipeline::from_config(config);
        assert_eq!(p.config().min_area, 10.0);
    }
}
