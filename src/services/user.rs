//! User account service

use serde_json::json;
use std::sync::Arc;

use super::{QueryParams, Reported};
use crate::api::dto::{Envelope, ListResponse, User};
use crate::api::{ApiClient, ApiError, ApiResult, MultipartForm, ProgressCallback, RequestOptions};
use crate::events::{AppEvent, EventBus, Resource};

#[derive(Clone)]
pub struct UserService {
    api: Arc<ApiClient>,
    events: EventBus,
}

impl UserService {
    pub fn new(api: Arc<ApiClient>, events: EventBus) -> Self {
        Self { api, events }
    }

    pub async fn list(&self, params: &QueryParams) -> ApiResult<ListResponse<User>> {
        self.api
            .request_json(&params.apply("/users"), RequestOptions::get())
            .await
            .reported(&self.events, Resource::User, "Failed to get users")
    }

    pub async fn get(&self, id: u64) -> ApiResult<User> {
        self.api
            .request_json::<Envelope<User>>(&format!("/users/{}", id), RequestOptions::get())
            .await
            .map(|env| env.data)
            .reported(
                &self.events,
                Resource::User,
                &format!("Failed to get user with ID {}", id),
            )
    }

    pub async fn create(&self, user: serde_json::Value) -> ApiResult<User> {
        let created = self
            .api
            .request_json::<Envelope<User>>("/users", RequestOptions::post(user))
            .await
            .map(|env| env.data)
            .reported(&self.events, Resource::User, "Failed to create user")?;

        self.events.emit(AppEvent::UserCreated {
            user: created.clone(),
        });
        Ok(created)
    }

    pub async fn update(&self, id: u64, changes: serde_json::Value) -> ApiResult<User> {
        let updated = self
            .api
            .request_json::<Envelope<User>>(&format!("/users/{}", id), RequestOptions::put(changes))
            .await
            .map(|env| env.data)
            .reported(
                &self.events,
                Resource::User,
                &format!("Failed to update user with ID {}", id),
            )?;

        self.events.emit(AppEvent::UserUpdated {
            user: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn delete(&self, id: u64) -> ApiResult<()> {
        self.api
            .request(&format!("/users/{}", id), RequestOptions::delete())
            .await
            .reported(
                &self.events,
                Resource::User,
                &format!("Failed to delete user with ID {}", id),
            )?;

        self.events.emit(AppEvent::UserDeleted { id });
        Ok(())
    }

    pub async fn change_password(&self, id: u64, current: &str, new: &str) -> ApiResult<()> {
        if current.is_empty() || new.is_empty() {
            return Err(ApiError::Validation(
                "Please fill in all password fields".to_string(),
            ));
        }

        self.api
            .request(
                &format!("/users/{}/password", id),
                RequestOptions::put(json!({
                    "current_password": current,
                    "new_password": new,
                })),
            )
            .await
            .reported(&self.events, Resource::User, "Failed to change password")?;

        self.events.emit(AppEvent::PasswordChanged);
        Ok(())
    }

    /// Admin reset of another user's password
    pub async fn reset_password(&self, id: u64, new: &str) -> ApiResult<()> {
        self.api
            .request(
                &format!("/users/{}/reset-password", id),
                RequestOptions::put(json!({ "new_password": new })),
            )
            .await
            .reported(&self.events, Resource::User, "Failed to reset password")?;

        self.events.emit(AppEvent::PasswordReset { id });
        Ok(())
    }

    pub async fn update_profile(&self, profile: serde_json::Value) -> ApiResult<User> {
        let user = self
            .api
            .request_json::<Envelope<User>>("/users/profile", RequestOptions::put(profile))
            .await
            .map(|env| env.data)
            .reported(&self.events, Resource::User, "Failed to update profile")?;

        self.events.emit(AppEvent::ProfileUpdated { user: user.clone() });
        Ok(user)
    }

    pub async fn upload_avatar(
        &self,
        filename: &str,
        mime: &str,
        bytes: Vec<u8>,
        progress: Option<ProgressCallback>,
    ) -> ApiResult<serde_json::Value> {
        let form = MultipartForm::new().file("avatar", filename, mime, bytes);
        let response = self
            .api
            .upload_file("/users/avatar", form, progress)
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::User, "Failed to upload avatar")?;

        self.events.emit(AppEvent::AvatarUpdated);
        Ok(response)
    }

    pub async fn activity_logs(&self, id: u64, params: &QueryParams) -> ApiResult<serde_json::Value> {
        self.api
            .request(
                &params.apply(&format!("/users/{}/activity-logs", id)),
                RequestOptions::get(),
            )
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::User, "Failed to get activity logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpMethod;
    use crate::events::EventKind;
    use crate::testing::{json_response, sample_user, sign_in, test_context};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_update_profile_emits_profile_updated() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        let updated = Arc::new(AtomicUsize::new(0));
        let u = Arc::clone(&updated);
        ctx.events.on(EventKind::ProfileUpdated, move |_| {
            u.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        transport.push(
            HttpMethod::Put,
            "/users/profile",
            json_response(200, json!({"success": true, "user": sample_user()})),
        );

        let user = ctx
            .services
            .user
            .update_profile(json!({"name": "Station Admin"}))
            .await
            .unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(updated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_change_password_validates_locally() {
        let (ctx, transport, _) = test_context();
        let err = ctx.services.user.change_password(1, "", "new").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_change_password_sends_both_fields() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(
            HttpMethod::Put,
            "/users/1/password",
            json_response(200, json!({"success": true})),
        );

        ctx.services.user.change_password(1, "old", "new").await.unwrap();

        let body = &transport.bodies(HttpMethod::Put, "/users/1/password")[0];
        assert_eq!(body["current_password"], "old");
        assert_eq!(body["new_password"], "new");
    }
}
