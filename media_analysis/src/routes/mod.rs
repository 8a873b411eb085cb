mod analyze_image;
mod analyze_video;
mod health;
mod metrics;
mod sentiment;

use crate::{server::SharedState, upload::UploadError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api/analyze-image", post(analyze_image::analyze_image))
        .route("/api/analyze-video", post(analyze_video::analyze_video))
        .route("/api/sentiment", post(sentiment::analyze_sentiment))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

pub(crate) fn error_response(status: StatusCode, error: &str, details: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            details,
        }),
    )
        .into_response()
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match &self {
            UploadError::Multipart(e) => {
                tracing::warn!("Rejected multipart body: {}", e);
                error_response(
                    StatusCode::BAD_REQUEST,
                    "Malformed upload",
                    Some(e.to_string()),
                )
            }
            other => {
                tracing::warn!("Rejected upload: {}", other);
                error_response(StatusCode::BAD_REQUEST, &other.to_string(), None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        classifier::{ClassifierError, EmotionClassifier},
        config::VideoConfig,
        sentiment::SentimentService,
        server::{build_router, SharedState},
        telemetry::Metrics,
        upload::UploadStore,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tonic::async_trait;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XBOUNDARYX";
    const ENGLISH_REVIEW: &str =
        "I love this movie, the story is wonderful and the actors are really great";

    struct MockClassifier {
        label: Option<&'static str>,
    }

    #[async_trait]
    impl EmotionClassifier for MockClassifier {
        async fn classify(&self, _image_data: Vec<u8>) -> Result<String, ClassifierError> {
            match self.label {
                Some(label) => Ok(label.to_string()),
                None => Err(ClassifierError::GrpcRequestFailed(tonic::Status::internal(
                    "Face could not be detected",
                ))),
            }
        }
    }

    fn test_app(label: Option<&'static str>) -> (Router, TempDir) {
        let upload_root = tempfile::tempdir().unwrap();
        let state = SharedState {
            classifier: Arc::new(MockClassifier { label }),
            video_config: VideoConfig::default(),
            uploads: Arc::new(UploadStore::new(upload_root.path()).unwrap()),
            sentiment: Arc::new(SentimentService::new(None)),
            metrics: Arc::new(Metrics::new().unwrap()),
        };
        (build_router(state, 1024 * 1024), upload_root)
    }

    fn multipart_request(uri: &str, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let (app, _uploads) = test_app(Some("happy"));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Available");
    }

    #[tokio::test]
    async fn test_analyze_image() {
        let (app, _uploads) = test_app(Some("happy"));
        let request = multipart_request("/api/analyze-image", "file", "face.png", b"png bytes");

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["expression"], "happy");
        assert_eq!(body["message"], "Image analyzed successfully");
    }

    #[tokio::test]
    async fn test_analyze_image_classifier_failure() {
        let (app, _uploads) = test_app(None);
        let request = multipart_request("/api/analyze-image", "file", "face.jpg", b"jpg bytes");

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Image processing failed");
        assert!(body["details"]
            .as_str()
            .unwrap()
            .contains("Face could not be detected"));
    }

    #[tokio::test]
    async fn test_analyze_image_rejects_video_extension() {
        let (app, _uploads) = test_app(Some("happy"));
        let request = multipart_request("/api/analyze-image", "file", "clip.mp4", b"data");

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid file type");
    }

    #[tokio::test]
    async fn test_missing_file_part() {
        let (app, _uploads) = test_app(Some("happy"));
        let request = multipart_request("/api/analyze-image", "image", "face.png", b"data");

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file part");
    }

    #[tokio::test]
    async fn test_empty_filename() {
        let (app, _uploads) = test_app(Some("happy"));
        let request = multipart_request("/api/analyze-video", "file", "", b"data");

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No selected file");
    }

    #[tokio::test]
    async fn test_analyze_video_without_multipart_body() {
        let (app, _uploads) = test_app(Some("happy"));
        let request = json_request("/api/analyze-video", serde_json::json!({}));

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file part");
    }

    #[tokio::test]
    async fn test_analyze_video_rejects_unknown_aggregation() {
        let (app, uploads) = test_app(Some("happy"));
        let request = multipart_request(
            "/api/analyze-video?aggregation=bogus",
            "file",
            "clip.mp4",
            b"data",
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("application/json"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Invalid aggregation");
        assert!(body["details"].as_str().unwrap().contains("bogus"));
        assert_eq!(std::fs::read_dir(uploads.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_unreadable_video_cleans_up() {
        let (app, uploads) = test_app(Some("happy"));
        let request = multipart_request(
            "/api/analyze-video",
            "file",
            "clip.mp4",
            b"this is not a video container",
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Video processing failed");
        assert_eq!(std::fs::read_dir(uploads.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_sentiment() {
        let (app, _uploads) = test_app(Some("happy"));
        let request = json_request(
            "/api/sentiment",
            serde_json::json!({"text": ENGLISH_REVIEW}),
        );

        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], "eng");
        assert_eq!(body["translatedText"], ENGLISH_REVIEW);
        assert!(body["sentiment"]["compound"].as_f64().unwrap() > 0.0);
        for key in ["neg", "neu", "pos"] {
            assert!(body["sentiment"][key].is_number());
        }
    }

    #[tokio::test]
    async fn test_sentiment_without_text() {
        for payload in [serde_json::json!({}), serde_json::json!({"text": "   "})] {
            let (app, _uploads) = test_app(Some("happy"));
            let request = json_request("/api/sentiment", payload);

            let (status, body) = send(app, request).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "No text provided");
        }
    }
}
