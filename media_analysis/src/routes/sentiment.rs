use crate::{
    language::TranslationError, routes::error_response, sentiment::TextAnalysis,
    server::SharedState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

const ROUTE: &str = "/api/sentiment";

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("No text provided")]
    NoText,
    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),
}

impl IntoResponse for SentimentError {
    fn into_response(self) -> Response {
        match self {
            SentimentError::NoText => {
                tracing::warn!("No text provided in request");
                error_response(StatusCode::BAD_REQUEST, "No text provided", None)
            }
            SentimentError::Translation(e) => {
                tracing::error!("Error analyzing sentiment: {}", e);
                error_response(
                    StatusCode::BAD_GATEWAY,
                    "Translation failed",
                    Some(e.to_string()),
                )
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SentimentRequest {
    #[serde(default)]
    text: Option<String>,
}

#[instrument(skip(state, payload))]
pub async fn analyze_sentiment(
    State(state): State<SharedState>,
    payload: Result<Json<SentimentRequest>, JsonRejection>,
) -> Result<Json<TextAnalysis>, SentimentError> {
    state.metrics.record_request(ROUTE);

    let text = payload
        .ok()
        .and_then(|Json(request)| request.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or(SentimentError::NoText)?;

    let start = Instant::now();
    let analysis = state.sentiment.analyze(&text).await?;
    state
        .metrics
        .record_analysis_duration(start.elapsed().as_millis() as u64, ROUTE);

    Ok(Json(analysis))
}
