use crate::{model_service::ModelService, state::State};
use emotion_proto::{
    emotion_service_server::EmotionService, EmotionLabels, EmotionPrediction, Empty, ImageFrame,
};
use std::sync::Arc;
use tonic::{async_trait, Request, Response, Status};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct InferenceService<M: ModelService, S: State> {
    model_service: Arc<M>,
    service_state: Arc<S>,
}

impl<M: ModelService, S: State> InferenceService<M, S> {
    pub fn new(model_service: M, state: S) -> Self {
        Self {
            model_service: Arc::new(model_service),
            service_state: Arc::new(state),
        }
    }
}

#[async_trait]
impl<M: ModelService, S: State> EmotionService for InferenceService<M, S> {
    #[instrument(skip(self, request))]
    async fn classify(
        &self,
        request: Request<ImageFrame>,
    ) -> Result<Response<EmotionPrediction>, Status> {
        let image_frame = request.into_inner();
        if image_frame.image_data.is_empty() {
            return Err(Status::invalid_argument("image_data is empty"));
        }

        let prediction = self.model_service.predict(image_frame).await?;

        tracing::debug!(
            "Dominant emotion: {} ({:.3})",
            self.service_state
                .label_for(prediction.dominant_class_id)
                .unwrap_or("unknown"),
            prediction.dominant_confidence
        );

        Ok(Response::new(prediction))
    }

    async fn get_emotion_labels(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<EmotionLabels>, Status> {
        let labels = self.service_state.get_labels().clone();

        Ok(Response::new(EmotionLabels { labels }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelsConfig;
    use emotion_proto::EmotionScore;
    use std::path::PathBuf;

    #[derive(Clone)]
    struct MockModelService {}

    #[async_trait]
    impl ModelService for MockModelService {
        async fn predict(&self, frame: ImageFrame) -> Result<EmotionPrediction, Status> {
            Ok(EmotionPrediction {
                dominant_class_id: 1,
                dominant_confidence: 0.9,
                scores: vec![
                    EmotionScore {
                        class_id: 0,
                        confidence: 0.1,
                    },
                    EmotionScore {
                        class_id: 1,
                        confidence: 0.9,
                    },
                ],
                timestamp: frame.timestamp,
            })
        }
    }

    pub struct MockState {
        emotion_labels: Vec<String>,
    }

    impl State for MockState {
        fn new(_labels_cfg: &LabelsConfig) -> Result<Self, String> {
            Ok(MockState {
                emotion_labels: vec!["neutral".to_string(), "happy".to_string()],
            })
        }

        fn get_labels(&self) -> &Vec<String> {
            &self.emotion_labels
        }
    }

    fn service() -> InferenceService<MockModelService, MockState> {
        let labels_config = LabelsConfig {
            labels_file: "dummy_labels.txt".to_string(),
            labels_dir: PathBuf::from("./dummy_labels_dir"),
        };
        let state = MockState::new(&labels_config).unwrap();
        InferenceService::new(MockModelService {}, state)
    }

    #[tokio::test]
    async fn test_classify() -> Result<(), Box<dyn std::error::Error>> {
        let inference_service = service();

        let request = Request::new(ImageFrame {
            image_data: vec![0; 100],
            timestamp: 12345,
        });
        let prediction = inference_service.classify(request).await?.into_inner();

        assert_eq!(prediction.dominant_class_id, 1);
        assert_eq!(prediction.scores.len(), 2);
        assert_eq!(prediction.timestamp, 12345);

        Ok(())
    }

    #[tokio::test]
    async fn test_classify_rejects_empty_frame() {
        let inference_service = service();

        let request = Request::new(ImageFrame {
            image_data: vec![],
            timestamp: 0,
        });
        let status = inference_service.classify(request).await.unwrap_err();

        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_emotion_labels() -> Result<(), Box<dyn std::error::Error>> {
        let inference_service = service();

        let labels = inference_service
            .get_emotion_labels(Request::new(Empty {}))
            .await?
            .into_inner();

        assert_eq!(labels.labels, vec!["neutral", "happy"]);
        Ok(())
    }
}
