//! Personnel service

use std::sync::Arc;

use super::{QueryParams, Reported};
use crate::api::dto::{Envelope, ListResponse, Personnel, PersonnelDraft};
use crate::api::{ApiClient, ApiResult, MultipartForm, ProgressCallback, RequestOptions};
use crate::events::{AppEvent, EventBus, Resource};

#[derive(Clone)]
pub struct PersonnelService {
    api: Arc<ApiClient>,
    events: EventBus,
}

impl PersonnelService {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self { api, events }
    }

    pub async fn list(&self, params: &QueryParams) -> ApiResult<ListResponse<Personnel>> {
        self.api
            .request_json(&params.apply("/personnel"), RequestOptions::get())
            .await
            .reported(&self.events, Resource::Personnel, "Failed to get personnel list")
    }

    pub async fn get(&self, id: u64) -> ApiResult<Personnel> {
        self.api
            .request_json::<Envelope<Personnel>>(&format!("/personnel/{}", id), RequestOptions::get())
            .await
            .map(|env| env.data)
            .reported(
                &self.events,
                Resource::Personnel,
                &format!("Failed to get personnel with ID {}", id),
            )
    }

    pub async fn create(&self, draft: &PersonnelDraft) -> ApiResult<Personnel> {
        let body = serde_json::to_value(draft)?;
        let personnel = self
            .api
            .request_json::<Envelope<Personnel>>("/personnel", RequestOptions::post(body))
            .await
            .map(|env| env.data)
            .reported(&self.events, Resource::Personnel, "Failed to create personnel")?;

        self.events.emit(AppEvent::PersonnelCreated {
            personnel: personnel.clone(),
        });
        Ok(personnel)
    }

    pub async fn update(&self, id: u64, draft: &PersonnelDraft) -> ApiResult<Personnel> {
        let body = serde_json::to_value(draft)?;
        let personnel = self
            .api
            .request_json::<Envelope<Personnel>>(&format!("/personnel/{}", id), RequestOptions::put(body))
            .await
            .map(|env| env.data)
            .reported(
                &self.events,
                Resource::Personnel,
                &format!("Failed to update personnel with ID {}", id),
            )?;

        self.events.emit(AppEvent::PersonnelUpdated {
            personnel: personnel.clone(),
        });
        Ok(personnel)
    }

    pub async fn delete(&self, id: u64) -> ApiResult<()> {
        self.api
            .request(&format!("/personnel/{}", id), RequestOptions::delete())
            .await
            .reported(
                &self.events,
                Resource::Personnel,
                &format!("Failed to delete personnel with ID {}", id),
            )?;

        self.events.emit(AppEvent::PersonnelDeleted { id });
        Ok(())
    }

    /// Upload a profile photo for a personnel record
    pub async fn upload_photo(
        &self,
        id: u64,
        filename: &str,
        mime: &str,
        bytes: Vec<u8>,
        progress: Option<ProgressCallback>,
    ) -> ApiResult<serde_json::Value> {
        let form = MultipartForm::new().file("photo", filename, mime, bytes);
        let response = self
            .api
            .upload_file(&format!("/personnel/{}/photo", id), form, progress)
            .await
            .reported(&self.events, Resource::Personnel, "Failed to upload personnel photo")?;

        self.events.emit(AppEvent::PersonnelPhotoUpdated { id });
        Ok(response.into_json())
    }

    pub async fn statistics(&self) -> ApiResult<serde_json::Value> {
        self.api
            .request("/personnel/statistics", RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Personnel, "Failed to get personnel statistics")
    }
}
