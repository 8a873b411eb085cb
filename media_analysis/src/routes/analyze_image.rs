use crate::{
    classifier::ClassifierError,
    routes::error_response,
    server::SharedState,
    upload::{read_upload, UploadError, UploadKind},
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const ROUTE: &str = "/api/analyze-image";

#[derive(Error, Debug)]
pub enum AnalyzeImageError {
    #[error("{0}")]
    Upload(#[from] UploadError),
    #[error("Image processing failed: {0}")]
    Classification(ClassifierError),
}

impl IntoResponse for AnalyzeImageError {
    fn into_response(self) -> Response {
        match self {
            AnalyzeImageError::Upload(e) => e.into_response(),
            AnalyzeImageError::Classification(e) => {
                tracing::error!("Error during image analysis: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Image processing failed",
                    Some(e.to_string()),
                )
            }
        }
    }
}

#[derive(Serialize)]
pub struct ImageAnalysisResponse {
    expression: String,
    message: &'static str,
}

#[instrument(skip(state, multipart))]
pub async fn analyze_image(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageAnalysisResponse>, AnalyzeImageError> {
    state.metrics.record_request(ROUTE);

    let multipart = multipart.map_err(|e| {
        tracing::warn!("No file part in the request: {}", e);
        UploadError::NoFilePart
    })?;
    let upload = read_upload(multipart, UploadKind::Image).await?;
    tracing::info!("Image {} received ({} bytes)", upload.filename, upload.data.len());

    let start = Instant::now();
    let expression = state
        .classifier
        .classify(upload.data.to_vec())
        .await
        .map_err(AnalyzeImageError::Classification)?;
    state
        .metrics
        .record_analysis_duration(start.elapsed().as_millis() as u64, ROUTE);

    tracing::debug!("Image Emotion Analysis: {}", expression);

    Ok(Json(ImageAnalysisResponse {
        expression,
        message: "Image analyzed successfully",
    }))
}
