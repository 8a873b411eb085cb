use emotion_proto::{EmotionPrediction, ImageFrame};
use tonic::{async_trait, Status};

#[async_trait]
pub trait ModelService: Send + Sync + Clone + 'static {
    async fn predict(&self, frame: ImageFrame) -> Result<EmotionPrediction, Status>;
}
