use opencv::{
    core::{Mat, Vector},
    imgcodecs,
    prelude::*,
    videoio,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Video source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Failed to read frame {index}: {reason}")]
    ReadFrameFailed { index: u64, reason: String },
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(String),
}

/// Sequential, read-once sequence of frames.
pub trait FrameSource: Send {
    type Frame;

    /// Returns `Ok(None)` at end of stream.
    fn read_frame(&mut self) -> Result<Option<Self::Frame>, VideoError>;

    fn encode_jpeg(&self, frame: &Self::Frame) -> Result<Vec<u8>, VideoError>;

    fn release(&mut self);
}

pub struct VideoFile {
    capture: videoio::VideoCapture,
    path: PathBuf,
    frames_read: u64,
}

impl VideoFile {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let path_str = path.to_str().ok_or_else(|| {
            VideoError::SourceUnavailable(format!("{} is not valid UTF-8", path.display()))
        })?;

        let capture = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|e| VideoError::SourceUnavailable(format!("{}: {}", path.display(), e)))?;

        let opened = capture
            .is_opened()
            .map_err(|e| VideoError::SourceUnavailable(format!("{}: {}", path.display(), e)))?;
        if !opened {
            return Err(VideoError::SourceUnavailable(format!(
                "cannot open {}",
                path.display()
            )));
        }

        tracing::debug!(
            "Opened {} ({} frames reported, {:.1} fps)",
            path.display(),
            capture.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(-1.0),
            capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0)
        );

        Ok(Self {
            capture,
            path: path.to_path_buf(),
            frames_read: 0,
        })
    }
}

impl FrameSource for VideoFile {
    type Frame = Mat;

    fn read_frame(&mut self) -> Result<Option<Mat>, VideoError> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(|e| VideoError::ReadFrameFailed {
                index: self.frames_read,
                reason: e.to_string(),
            })?;

        if !grabbed || frame.empty() {
            return Ok(None);
        }

        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn encode_jpeg(&self, frame: &Mat) -> Result<Vec<u8>, VideoError> {
        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".jpg", frame, &mut buf, &Vector::new())
            .map_err(|e| VideoError::EncodeFrameFailed(e.to_string()))?;
        Ok(buf.into())
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("Failed to release {}: {}", self.path.display(), e);
        }
    }
}
