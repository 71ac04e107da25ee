//! Camera seam
//!
//! A [`Camera`] hands out [`MediaStream`]s and grabs JPEG frames from them.
//! Stopping a stream stops all of its tracks; clones share track state, so a
//! view can stop the stream it holds and the camera sees it stopped too.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera access denied")]
    PermissionDenied,

    #[error("No camera available: {0}")]
    Unavailable(String),

    #[error("Camera is not running")]
    NotStarted,

    #[error("Failed to capture frame: {0}")]
    Capture(String),
}

pub type CameraResult<T> = Result<T, CameraError>;

/// One video track
#[derive(Debug, Clone)]
pub struct MediaTrack {
    label: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// An open camera stream
#[derive(Debug, Clone)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    /// Stream with a single video track
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            tracks: vec![MediaTrack::new(label)],
        }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Live while any track is live
    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// A captured still
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Frame {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "image/jpeg".to_string(),
        }
    }

    /// Frame from an image file, typed by extension
    pub fn from_file(path: &Path) -> CameraResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| CameraError::Capture(format!("{}: {}", path.display(), e)))?;
        let mime = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        };
        Ok(Self {
            bytes,
            mime: mime.to_string(),
        })
    }
}

/// Source of video frames
#[async_trait]
pub trait Camera: Send + Sync {
    /// Ask for the camera; may be refused
    async fn open(&self) -> CameraResult<MediaStream>;

    /// Grab the current frame of a live stream
    async fn capture(&self, stream: &MediaStream) -> CameraResult<Frame>;
}

/// Serves a still image as every frame
pub struct ImageFileCamera {
    path: PathBuf,
}

impl ImageFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Camera for ImageFileCamera {
    async fn open(&self) -> CameraResult<MediaStream> {
        if !self.path.exists() {
            return Err(CameraError::Unavailable(self.path.display().to_string()));
        }
        Ok(MediaStream::new(self.path.display().to_string()))
    }

    async fn capture(&self, stream: &MediaStream) -> CameraResult<Frame> {
        if !stream.is_live() {
            return Err(CameraError::NotStarted);
        }
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Frame::from_file(&path))
            .await
            .map_err(|e| CameraError::Capture(e.to_string()))?
    }
}

/// Camera for hosts without one
pub struct NoCamera;

#[async_trait]
impl Camera for NoCamera {
    async fn open(&self) -> CameraResult<MediaStream> {
        Err(CameraError::Unavailable("no camera configured".to_string()))
    }

    async fn capture(&self, _stream: &MediaStream) -> CameraResult<Frame> {
        Err(CameraError::NotStarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopping_a_clone_stops_the_stream() {
        let stream = MediaStream::new("front");
        let held = stream.clone();
        assert!(stream.is_live());

        held.stop();
        assert!(!stream.is_live());
        assert!(stream.tracks().iter().all(|t| !t.is_live()));
    }

    #[tokio::test]
    async fn test_image_file_camera() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let camera = ImageFileCamera::new(&path);
        let stream = camera.open().await.unwrap();
        let frame = camera.capture(&stream).await.unwrap();
        assert_eq!(frame.mime, "image/png");
        assert_eq!(frame.bytes.len(), 4);

        stream.stop();
        assert_eq!(camera.capture(&stream).await, Err(CameraError::NotStarted));

        let missing = ImageFileCamera::new(dir.path().join("missing.jpg"));
        assert!(matches!(missing.open().await, Err(CameraError::Unavailable(_))));
    }
}
