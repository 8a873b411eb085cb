use crate::config::PredictionServiceConfig;
use emotion_proto::{emotion_service_client::EmotionServiceClient, Empty, ImageFrame};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tonic::{
    async_trait,
    transport::{Channel, Error},
    Request, Status,
};
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Failed to connect to gRPC server: {0}")]
    ConnectionFailed(#[from] Error),
    #[error("Maximum connection retries exceeded.")]
    MaxRetriesExceeded,
    #[error("gRPC request failed: {0}")]
    GrpcRequestFailed(#[from] Status),
    #[error("Emotion service returned unknown class {0}")]
    UnknownClass(u32),
}

/// Single-image emotion classifier returning the dominant emotion label.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, image_data: Vec<u8>) -> Result<String, ClassifierError>;
}

pub struct EmotionClient {
    client: EmotionServiceClient<Channel>,
    emotion_labels: Vec<String>,
}

impl EmotionClient {
    pub async fn new(prediction_config: &PredictionServiceConfig) -> Result<Self, ClassifierError> {
        let mut client = Self::get_client(prediction_config.get_address()).await?;

        let emotion_labels = client
            .get_emotion_labels(Request::new(Empty {}))
            .await?
            .into_inner()
            .labels;
        tracing::info!("Emotion service exposes labels {:?}", emotion_labels);

        Ok(Self {
            client,
            emotion_labels,
        })
    }

    async fn get_client(address: String) -> Result<EmotionServiceClient<Channel>, ClassifierError> {
        let mut retry_delay = Duration::from_millis(50);
        let max_retry_delay = Duration::from_secs(1);
        let max_retries = 10;
        let mut retry_count = 0;

        while retry_count < max_retries {
            match timeout(
                Duration::from_secs(1),
                EmotionServiceClient::connect(address.clone()),
            )
            .await
            {
                Ok(Ok(client)) => return Ok(client),
                Ok(Err(e)) => {
                    tracing::error!("Failed to connect to gRPC server: {:?}", e);
                }
                Err(_) => {
                    tracing::error!("Connection timeout");
                }
            }

            retry_count += 1;
            let jitter = rand::random::<f32>() * 0.2 + 0.9;
            sleep(retry_delay.mul_f32(jitter)).await;
            retry_delay = (retry_delay * 2).min(max_retry_delay);
        }

        Err(ClassifierError::MaxRetriesExceeded)
    }
}

#[async_trait]
impl EmotionClassifier for EmotionClient {
    #[instrument(skip(self, image_data))]
    async fn classify(&self, image_data: Vec<u8>) -> Result<String, ClassifierError> {
        let mut client = self.client.clone();

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        let request = Request::new(ImageFrame {
            image_data,
            timestamp,
        });

        let prediction = client.classify(request).await?.into_inner();

        self.emotion_labels
            .get(prediction.dominant_class_id as usize)
            .cloned()
            .ok_or(ClassifierError::UnknownClass(prediction.dominant_class_id))
    }
}
