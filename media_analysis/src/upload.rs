use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart},
};
use std::{
    io,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use thiserror::Error;

const FILE_FIELD: &str = "file";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Video,
}

impl UploadKind {
    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Image => IMAGE_EXTENSIONS,
            UploadKind::Video => VIDEO_EXTENSIONS,
        }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

pub fn allowed_file(filename: &str, kind: UploadKind) -> bool {
    match filename.rsplit_once('.') {
        Some((_, extension)) => kind
            .allowed_extensions()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension)),
        None => false,
    }
}

/// Keeps only the last path component of a client supplied filename.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Pulls the `file` field out of the multipart body and validates its name.
pub async fn read_upload(mut multipart: Multipart, kind: UploadKind) -> Result<Upload, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_string).unwrap_or_default();
        let data = field.bytes().await?;

        let filename = sanitize_filename(&filename).ok_or(UploadError::NoSelectedFile)?;
        if !allowed_file(&filename, kind) {
            tracing::warn!("Invalid file type uploaded: {}", filename);
            return Err(UploadError::InvalidFileType);
        }

        return Ok(Upload { filename, data });
    }

    Err(UploadError::NoFilePart)
}

#[derive(Debug)]
pub struct UploadStore {
    directory: PathBuf,
}

impl UploadStore {
    pub fn new(directory: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(directory)?;
        tracing::info!("Storing uploads under {}", directory.display());
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    /// Per-request directory, removed with everything in it when dropped.
    pub fn scratch_dir(&self) -> io::Result<TempDir> {
        tempfile::Builder::new()
            .prefix("request-")
            .tempdir_in(&self.directory)
    }

    pub async fn save(&self, scratch: &TempDir, upload: &Upload) -> io::Result<PathBuf> {
        let path = scratch.path().join(&upload.filename);
        tokio::fs::write(&path, &upload.data).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("face.png", UploadKind::Image));
        assert!(allowed_file("FACE.JPEG", UploadKind::Image));
        assert!(allowed_file("clip.final.mov", UploadKind::Video));
        assert!(!allowed_file("clip.mp4", UploadKind::Image));
        assert!(!allowed_file("face.png", UploadKind::Video));
        assert!(!allowed_file("README", UploadKind::Image));
        assert!(!allowed_file("archive.tar.gz", UploadKind::Video));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("face.png"), Some("face.png".to_string()));
        assert_eq!(
            sanitize_filename("../../etc/passwd"),
            Some("passwd".to_string())
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\clip.mp4"),
            Some("clip.mp4".to_string())
        );
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("uploads/"), None);
        assert_eq!(sanitize_filename(".."), None);
    }

    #[tokio::test]
    async fn test_scratch_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let store = UploadStore::new(&root.path().join("uploads")).unwrap();

        let scratch = store.scratch_dir().unwrap();
        let upload = Upload {
            filename: "clip.mp4".to_string(),
            data: Bytes::from_static(b"not really a video"),
        };
        let saved = store.save(&scratch, &upload).await.unwrap();

        assert!(saved.starts_with(root.path().join("uploads")));
        assert_eq!(std::fs::read(&saved).unwrap(), b"not really a video");

        drop(scratch);
        assert!(!saved.exists());
    }
}
