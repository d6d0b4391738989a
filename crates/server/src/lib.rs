//! img2html web shell
//!
//! Upload page plus a small REST API around [`core_pipeline::Pipeline`].
//! Each upload runs on a blocking worker; its temporary files are removed
//! before the response is sent.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use core_pipeline::report::{png_data_url, REPORT_FILENAME, REPORT_MIME};
use core_pipeline::{BoundingBox, CollectedErrors, Pipeline, PipelineError, Upload};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Image Text and Visual Element Extractor</title></head>
<body>
<h1>Image Text and Visual Element Extractor</h1>
<p>Upload an image to extract its text with OCR and isolate the visual
elements found in it. The result is an HTML report you can download.</p>
<form action="/api/extract/download" method="post" enctype="multipart/form-data">
<input type="file" name="image" accept=".jpg,.jpeg,.png,image/jpeg,image/png" required>
<button type="submit">Download HTML</button>
</form>
</body>
</html>
"#;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Build the application router
pub fn router(pipeline: Pipeline) -> Router {
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/extract", post(extract))
        .route("/api/extract/download", post(download_report))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped
pub async fn serve(addr: SocketAddr, pipeline: Pipeline) -> anyhow::Result<()> {
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let response = run_blocking(state, upload).await?;
    Ok(Json(response))
}

async fn download_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart).await?;
    let response = run_blocking(state, upload).await?;
    Ok((
        [
            (header::CONTENT_TYPE, REPORT_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILENAME),
            ),
        ],
        response.html,
    )
        .into_response())
}

/// Pull the `image` field out of a multipart form
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        return Ok(Upload::new(filename, bytes.to_vec()));
    }
    Err(ApiError::BadRequest(
        "Missing multipart field 'image'".to_string(),
    ))
}

/// Run one request off the async runtime and clean up after it
async fn run_blocking(state: AppState, upload: Upload) -> Result<ExtractResponse, ApiError> {
    tokio::task::spawn_blocking(move || process(&state.pipeline, &upload))
        .await
        .map_err(|e| ApiError::Internal(format!("Extraction task failed: {}", e)))?
}

fn process(pipeline: &Pipeline, upload: &Upload) -> Result<ExtractResponse, ApiError> {
    let sink = CollectedErrors::new();
    let extraction = pipeline.run(upload, &sink)?;

    // Crops are read before cleanup; the response must not reference deleted files.
    let built = extraction.element_pngs().map(|pngs| {
        let elements = extraction
            .elements
            .iter()
            .zip(&pngs)
            .map(|(element, png)| ElementInfo {
                index: element.index,
                bbox: element.bbox,
                data_url: png_data_url(png),
            })
            .collect::<Vec<_>>();
        let html = core_pipeline::report::render_embedded(&extraction.text, &pngs);
        (elements, html)
    });
    let text = extraction.text.clone();
    let request_id = extraction.id().to_string();

    extraction.cleanup()?;
    let (elements, html) = built?;

    Ok(ExtractResponse {
        request_id,
        text,
        errors: sink.into_messages(),
        elements,
        html,
    })
}

/// JSON body returned by `POST /api/extract`
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub request_id: String,
    pub text: String,
    pub errors: Vec<String>,
    pub elements: Vec<ElementInfo>,
    pub html: String,
}

/// One cropped element, inlined as a PNG data URI
#[derive(Debug, Serialize, Deserialize)]
pub struct ElementInfo {
    pub index: usize,
    pub bbox: BoundingBox,
    pub data_url: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Failures that end a request
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!("{}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}
