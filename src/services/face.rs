//! Face recognition service
//!
//! Frames are uploaded as multipart JPEGs. Detection does not publish error
//! events because the capture loop retries on its own.

use std::sync::Arc;

use super::Reported;
use crate::api::dto::DetectionResponse;
use crate::api::{ApiClient, ApiResult, MultipartForm, ProgressCallback, RequestOptions};
use crate::events::{AppEvent, EventBus, Resource};
use crate::face::Frame;

#[derive(Clone)]
pub struct FaceService {
    api: Arc<ApiClient>,
    events: EventBus,
}

impl FaceService {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self { api, events }
    }

    /// Detect and identify faces in one frame
    pub async fn detect(&self, frame: &Frame) -> ApiResult<DetectionResponse> {
        let form = frame_form(frame);
        let payload = self.api.upload_file("/face/detect", form, None).await?;
        Ok(serde_json::from_value(payload.into_json())?)
    }

    /// Register a face image for a personnel record
    pub async fn register(
        &self,
        personnel_id: u64,
        frame: &Frame,
        progress: Option<ProgressCallback>,
    ) -> ApiResult<serde_json::Value> {
        let response = self
            .api
            .upload_file(
                &format!("/personnel/{}/face", personnel_id),
                frame_form(frame),
                progress,
            )
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Face, "Failed to register face")?;

        tracing::info!(personnel_id, "Face registered");
        self.events.emit(AppEvent::FaceRegistered { personnel_id });
        Ok(response)
    }

    pub async fn delete(&self, personnel_id: u64, face_id: u64) -> ApiResult<()> {
        self.api
            .request(
                &format!("/personnel/{}/face/{}", personnel_id, face_id),
                RequestOptions::delete(),
            )
            .await
            .reported(&self.events, Resource::Face, "Failed to delete face")?;

        self.events.emit(AppEvent::FaceDeleted { face_id });
        Ok(())
    }

    pub async fn list(&self, personnel_id: u64) -> ApiResult<serde_json::Value> {
        self.api
            .request(&format!("/personnel/{}/faces", personnel_id), RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Face, "Failed to get faces")
    }

    pub async fn statistics(&self) -> ApiResult<serde_json::Value> {
        self.api
            .request("/face/statistics", RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(
                &self.events,
                Resource::Face,
                "Failed to get face recognition statistics",
            )
    }
}

fn frame_form(frame: &Frame) -> MultipartForm {
    MultipartForm::new().file("image", "face.jpg", frame.mime.clone(), frame.bytes.clone())
}
