use crate::{
    classifier::{ClassifierError, EmotionClassifier},
    video::{FrameSource, VideoError, VideoFile},
};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use thiserror::Error;
use tracing::instrument;

pub const DEFAULT_FRAME_STRIDE: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Frames,
    #[serde(alias = "majority_vote")]
    Majority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameExpression {
    pub frame: u64,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VideoAnalysis {
    Frames { frames: Vec<FrameExpression> },
    /// `None` when no sampled frame could be classified.
    Majority { analysis: Option<String> },
}

#[derive(Debug)]
pub struct VideoAnalysisReport {
    pub analysis: VideoAnalysis,
    pub frames_read: u64,
    pub frames_sampled: u64,
    pub frames_failed: u64,
}

#[derive(Error, Debug)]
enum FrameError {
    #[error("{0}")]
    Encode(#[from] VideoError),
    #[error("Failed to write frame image: {0}")]
    Persist(#[from] std::io::Error),
    #[error("{0}")]
    Classify(#[from] ClassifierError),
}

pub struct VideoAnalyzer<C: ?Sized> {
    classifier: Arc<C>,
    frame_stride: u64,
}

impl<C: EmotionClassifier + ?Sized> VideoAnalyzer<C> {
    pub fn new(classifier: Arc<C>, frame_stride: u64) -> Self {
        Self {
            classifier,
            frame_stride: frame_stride.max(1),
        }
    }

    pub async fn analyze_file(
        &self,
        path: &Path,
        frame_dir: Option<&Path>,
        aggregation: Aggregation,
    ) -> Result<VideoAnalysisReport, VideoError> {
        let path = path.to_path_buf();
        let source = tokio::task::spawn_blocking(move || VideoFile::open(&path))
            .await
            .map_err(|e| VideoError::SourceUnavailable(e.to_string()))??;
        self.analyze(source, frame_dir, aggregation).await
    }

    /// Classifies every `frame_stride`-th frame of `source`. Frames that fail
    /// to encode, persist or classify are skipped; a read failure aborts the
    /// scan. The source is released exactly once on every path.
    ///
    /// Decoding runs on the blocking pool, one stride-sized burst at a time.
    #[instrument(skip(self, source, frame_dir))]
    pub async fn analyze<S: FrameSource + 'static>(
        &self,
        mut source: S,
        frame_dir: Option<&Path>,
        aggregation: Aggregation,
    ) -> Result<VideoAnalysisReport, VideoError> {
        let mut results = Vec::new();
        let mut frame_index: u64 = 0;
        let mut frames_sampled: u64 = 0;
        let mut frames_failed: u64 = 0;

        loop {
            let stride = self.frame_stride;
            let first_index = frame_index;
            // A panic while decoding drops the source along with the task.
            let (returned, burst) = tokio::task::spawn_blocking(move || {
                let burst = read_to_next_sample(&mut source, first_index, stride);
                (source, burst)
            })
            .await
            .map_err(|e| VideoError::ReadFrameFailed {
                index: first_index,
                reason: e.to_string(),
            })?;
            source = returned;
            frame_index += burst.frames_read;

            let encoded = match burst.outcome {
                Ok(Some(encoded)) => encoded,
                Ok(None) => break,
                Err(e) => {
                    source.release();
                    return Err(e);
                }
            };

            let sampled_index = frame_index - 1;
            frames_sampled += 1;
            match self.submit_frame(encoded, sampled_index, frame_dir).await {
                Ok(expression) => results.push(FrameExpression {
                    frame: sampled_index,
                    expression,
                }),
                Err(e) => {
                    frames_failed += 1;
                    tracing::error!("Error analyzing frame {}: {}", sampled_index, e);
                }
            }
        }

        source.release();
        tracing::debug!(
            "Processed {} frames, classified {}/{}",
            frame_index,
            results.len(),
            frames_sampled
        );

        Ok(VideoAnalysisReport {
            analysis: aggregate(results, aggregation),
            frames_read: frame_index,
            frames_sampled,
            frames_failed,
        })
    }

    async fn submit_frame(
        &self,
        encoded: Result<Vec<u8>, VideoError>,
        frame_index: u64,
        frame_dir: Option<&Path>,
    ) -> Result<String, FrameError> {
        let image_data = encoded?;

        if let Some(dir) = frame_dir {
            let frame_path = dir.join(format!("frame_{}.jpg", frame_index));
            tokio::fs::write(&frame_path, &image_data).await?;
        }

        Ok(self.classifier.classify(image_data).await?)
    }
}

/// Frames consumed by one blocking read step.
struct Burst {
    frames_read: u64,
    /// `Ok(None)` at end of stream, otherwise the encoded sampled frame.
    outcome: Result<Option<Result<Vec<u8>, VideoError>>, VideoError>,
}

/// Reads forward from `first_index` up to and including the next frame whose
/// index is a multiple of `stride`, and encodes that frame.
fn read_to_next_sample<S: FrameSource>(source: &mut S, first_index: u64, stride: u64) -> Burst {
    let mut frames_read = 0;
    loop {
        let index = first_index + frames_read;
        match source.read_frame() {
            Ok(Some(frame)) => {
                frames_read += 1;
                if index % stride == 0 {
                    return Burst {
                        frames_read,
                        outcome: Ok(Some(source.encode_jpeg(&frame))),
                    };
                }
            }
            Ok(None) => {
                return Burst {
                    frames_read,
                    outcome: Ok(None),
                }
            }
            Err(e) => {
                return Burst {
                    frames_read,
                    outcome: Err(e),
                }
            }
        }
    }
}

pub fn aggregate(results: Vec<FrameExpression>, aggregation: Aggregation) -> VideoAnalysis {
    match aggregation {
        Aggregation::Frames => VideoAnalysis::Frames { frames: results },
        Aggregation::Majority => VideoAnalysis::Majority {
            analysis: majority_vote(&results),
        },
    }
}

/// Most frequent expression; on a tie, the one seen first wins.
pub fn majority_vote(results: &[FrameExpression]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for result in results {
        match counts
            .iter_mut()
            .find(|(label, _)| *label == result.expression)
        {
            Some(entry) => entry.1 += 1,
            None => counts.push((result.expression.as_str(), 1)),
        }
    }

    counts
        .into_iter()
        .reduce(|best, item| if item.1 > best.1 { item } else { best })
        .map(|(label, _)| label.to_string())
}
