use crate::{
    analyzer::{Aggregation, VideoAnalysis, VideoAnalyzer},
    config::VideoConfig,
    routes::error_response,
    server::SharedState,
    upload::{read_upload, UploadError, UploadKind},
    video::VideoError,
};
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const ROUTE: &str = "/api/analyze-video";

#[derive(Error, Debug)]
pub enum AnalyzeVideoError {
    #[error("Invalid aggregation: {0}")]
    InvalidQuery(#[from] QueryRejection),
    #[error("{0}")]
    Upload(#[from] UploadError),
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Video processing failed: {0}")]
    Processing(#[from] VideoError),
}

impl IntoResponse for AnalyzeVideoError {
    fn into_response(self) -> Response {
        match self {
            AnalyzeVideoError::InvalidQuery(e) => {
                tracing::warn!("Rejected query string: {}", e);
                error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid aggregation",
                    Some(e.body_text()),
                )
            }
            AnalyzeVideoError::Upload(e) => e.into_response(),
            AnalyzeVideoError::Storage(e) => {
                tracing::error!("Failed to store uploaded video: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to store upload",
                    Some(e.to_string()),
                )
            }
            AnalyzeVideoError::Processing(e) => {
                tracing::error!("Error during video analysis: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Video processing failed",
                    Some(e.to_string()),
                )
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoQuery {
    aggregation: Option<Aggregation>,
}

impl VideoQuery {
    /// The requested aggregation, falling back to the configured one.
    fn aggregation_or(&self, config: &VideoConfig) -> Aggregation {
        self.aggregation.unwrap_or(config.aggregation)
    }
}

#[derive(Serialize)]
pub struct VideoAnalysisResponse {
    #[serde(flatten)]
    analysis: VideoAnalysis,
    message: &'static str,
}

#[instrument(skip(state, multipart))]
pub async fn analyze_video(
    State(state): State<SharedState>,
    query: Result<Query<VideoQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VideoAnalysisResponse>, AnalyzeVideoError> {
    state.metrics.record_request(ROUTE);

    let Query(query) = query?;

    let multipart = multipart.map_err(|e| {
        tracing::warn!("No file part in the request: {}", e);
        UploadError::NoFilePart
    })?;
    let upload = read_upload(multipart, UploadKind::Video).await?;

    let scratch = state.uploads.scratch_dir()?;
    let video_path = state.uploads.save(&scratch, &upload).await?;
    tracing::info!("Video file saved at: {}", video_path.display());

    let aggregation = query.aggregation_or(&state.video_config);
    let frame_dir = state.video_config.persist_frames.then(|| scratch.path());
    let analyzer = VideoAnalyzer::new(state.classifier.clone(), state.video_config.frame_stride);

    let start = Instant::now();
    let report = analyzer
        .analyze_file(&video_path, frame_dir, aggregation)
        .await?;
    state
        .metrics
        .record_analysis_duration(start.elapsed().as_millis() as u64, ROUTE);
    state
        .metrics
        .record_frames(report.frames_sampled, report.frames_failed);

    tracing::debug!(
        "Video Frame Expressions: {:?} ({} of {} frames sampled)",
        report.analysis,
        report.frames_sampled,
        report.frames_read
    );

    Ok(Json(VideoAnalysisResponse {
        analysis: report.analysis,
        message: "Video analyzed successfully",
    }))
}
