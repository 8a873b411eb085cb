use crate::{
    config::{ModelConfig, Validatable},
    model_service::ModelService,
};
use emotion_proto::{EmotionPrediction, EmotionScore, ImageFrame};
use image::imageops::FilterType;
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tonic::{async_trait, Status};

/// Decodes the frame and builds a `1x1xNxN` grayscale tensor of raw 0-255 intensities.
fn transform_image_frame(
    image_frame: &ImageFrame,
    input_size: u32,
) -> Result<Array<f32, Ix4>, String> {
    let image_reader = image::ImageReader::new(std::io::Cursor::new(&image_frame.image_data))
        .with_guessed_format()
        .map_err(|e| format!("Error decoding image: {}", e))?;

    let original_img = image_reader
        .decode()
        .map_err(|e| format!("Error decoding image: {}", e))?;

    let gray = original_img
        .resize_exact(input_size, input_size, FilterType::Triangle)
        .to_luma8();

    let side = input_size as usize;
    let mut input = Array::zeros((1, 1, side, side));
    for (x, y, pixel) in gray.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel.0[0] as f32;
    }

    Ok(input)
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

fn dominant(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .reduce(|accum, item| if item.1 > accum.1 { item } else { accum })
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    output_name: String,
    input_size: u32,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let output_name = {
            let session = sessions[0]
                .lock()
                .map_err(|e| format!("session mutex poisoned: {}", e))?;
            session
                .outputs
                .first()
                .map(|output| output.name.clone())
                .ok_or("model declares no outputs")?
        };

        tracing::info!(
            "Created {} ONNX sessions, reading output `{}`",
            num_instances,
            output_name
        );

        Ok(Self {
            counter: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(sessions),
            output_name,
            input_size: model_config.input_size,
        })
    }

    pub fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, Box<Status>> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let session_arc = &self.sessions[index];
        let mut session = session_arc
            .lock()
            .map_err(|e| Status::internal(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);

        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| Status::internal(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| Status::internal(format!("inference failed: {}", e)))?;

        let (_, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| Status::internal(format!("failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn predict(&self, frame: ImageFrame) -> Result<EmotionPrediction, Status> {
        let input = transform_image_frame(&frame, self.input_size).map_err(|err| {
            Status::invalid_argument(format!("Image transformation error: {}", err))
        })?;

        let logits = self.run_inference(&input).map_err(|err| *err)?;
        let probabilities = softmax(&logits);

        let (class_id, confidence) = dominant(&probabilities)
            .ok_or_else(|| Status::internal("model returned an empty score vector"))?;

        let scores = probabilities
            .iter()
            .enumerate()
            .map(|(class_id, confidence)| EmotionScore {
                class_id: class_id as u32,
                confidence: *confidence,
            })
            .collect();

        Ok(EmotionPrediction {
            dominant_class_id: class_id as u32,
            dominant_confidence: confidence,
            scores,
            timestamp: frame.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_transform_image_frame() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 80, Rgb([255, 255, 255]));
        let mut image_data: Vec<u8> = Vec::new();
        img.write_to(&mut Cursor::new(&mut image_data), image::ImageFormat::Png)
            .unwrap();

        let image_frame = ImageFrame {
            image_data,
            timestamp: 0,
        };

        let input = transform_image_frame(&image_frame, 64).unwrap();

        assert_eq!(input.shape(), &[1, 1, 64, 64]);
        assert_eq!(input[[0, 0, 10, 10]], 255.0);
    }

    #[test]
    fn test_transform_rejects_garbage() {
        let image_frame = ImageFrame {
            image_data: vec![0, 1, 2, 3],
            timestamp: 0,
        };

        assert!(transform_image_frame(&image_frame, 64).is_err());
    }

    #[test]
    fn test_softmax_and_dominant() {
        let probabilities = softmax(&[1.0, 3.0, 0.5, 3.0]);
        let total: f32 = probabilities.iter().sum();

        assert!((total - 1.0).abs() < 1e-5);
        // ties keep the first maximum
        let (class_id, confidence) = dominant(&probabilities).unwrap();
        assert_eq!(class_id, 1);
        assert!(confidence > 0.4);
        assert!(dominant(&[]).is_none());
    }
}
