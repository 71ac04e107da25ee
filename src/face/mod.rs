//! Face Capture
//!
//! - **camera**: the [`Camera`] seam, media streams and frames
//! - **capture**: the cancellable detection loop and the capture state machine

mod camera;
mod capture;

pub use camera::{
    Camera, CameraError, CameraResult, Frame, ImageFileCamera, MediaStream, MediaTrack, NoCamera,
};
pub use capture::{
    interpret, spawn_detection, CaptureState, DetectionEvent, DetectionHandle, DetectionSettings,
    FaceDetector,
};
