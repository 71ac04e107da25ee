//! Authentication service
//!
//! Owns the signed-in user and the background token refresh. Tokens
//! themselves live in the [`TokenStore`](crate::session::TokenStore) behind
//! the API client.

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::Reported;
use crate::api::dto::{AuthResponse, User};
use crate::api::{ApiClient, ApiError, ApiResult, RequestOptions};
use crate::config::{AuthConfig, StorageConfig};
use crate::events::{AppEvent, EventBus, Resource};
use crate::storage::KeyValueStore;

/// Sign-in, sign-out and session upkeep
#[derive(Clone)]
pub struct AuthService {
    api: Arc<ApiClient>,
    events: EventBus,
    store: Arc<dyn KeyValueStore>,
    remember_email_key: String,
    refresh_interval: Duration,
    current_user: Arc<Mutex<Option<User>>>,
    refresh_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AuthService {
    pub fn new(
        api: Arc<ApiClient>,
        events: EventBus,
        store: Arc<dyn KeyValueStore>,
        auth: &AuthConfig,
        storage: &StorageConfig,
    ) -> Self {
        Self {
            api,
            events,
            store,
            remember_email_key: storage.remember_email_key.clone(),
            refresh_interval: Duration::from_secs(auth.refresh_interval_secs),
            current_user: Arc::new(Mutex::new(None)),
            refresh_task: Arc::new(Mutex::new(None)),
        }
    }

    /// A non-empty access token is present
    pub fn is_authenticated(&self) -> bool {
        self.api.is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_user
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    fn set_current_user(&self, user: Option<User>) {
        if let Ok(mut guard) = self.current_user.lock() {
            *guard = user;
        }
    }

    /// Verify the stored session, refreshing it if `/auth/me` rejects the token
    pub async fn check_auth(&self) -> bool {
        if !self.is_authenticated() {
            return false;
        }

        match self.get_user_data().await {
            Ok(_) => {
                self.start_token_refresh();
                true
            }
            Err(e) => {
                tracing::info!(error = %e, "Stored session rejected, trying refresh");
                self.refresh_token().await
            }
        }
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<User> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Please enter both email and password".to_string(),
            ));
        }

        let result = self.try_login(email, password).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Login failed");
            self.events.emit(AppEvent::error(Resource::Auth, e.message()));
        }
        result
    }

    async fn try_login(&self, email: &str, password: &str) -> ApiResult<User> {
        let response: AuthResponse = self
            .api
            .request_json(
                "/auth/login",
                RequestOptions::post(json!({ "email": email, "password": password })),
            )
            .await?;

        let (access, user) = match (response.success, response.access_token, response.user) {
            (true, Some(access), Some(user)) => (access, user),
            _ => {
                return Err(ApiError::Rejected(
                    response.error.unwrap_or_else(|| "Login failed".to_string()),
                ))
            }
        };

        self.api
            .tokens()
            .set_tokens(&access, response.refresh_token.as_deref())?;
        self.set_current_user(Some(user.clone()));
        self.start_token_refresh();

        tracing::info!(user_id = user.id, "Signed in");
        self.events.emit(AppEvent::AuthLogin { user: user.clone() });
        Ok(user)
    }

    /// Sign out; the server call is best-effort, local state is always cleared
    pub async fn logout(&self) {
        if self.is_authenticated() {
            if let Err(e) = self
                .api
                .request("/auth/logout", RequestOptions::post_empty())
                .await
            {
                tracing::warn!(error = %e, "Logout request failed");
            }
        }

        self.clear_auth_data();
        tracing::info!("Signed out");
        self.events.emit(AppEvent::AuthLogout);
    }

    /// Exchange the refresh token and reload the user; false clears the session
    pub async fn refresh_token(&self) -> bool {
        let refreshed = async {
            self.api.refresh_session().await?;
            self.get_user_data().await
        }
        .await;

        match refreshed {
            Ok(_) => {
                self.start_token_refresh();
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                self.clear_auth_data();
                false
            }
        }
    }

    /// Load the signed-in user from `/auth/me`
    pub async fn get_user_data(&self) -> ApiResult<User> {
        let response: AuthResponse = self
            .api
            .request_json("/auth/me", RequestOptions::get())
            .await?;

        match (response.success, response.user) {
            (true, Some(user)) => {
                self.set_current_user(Some(user.clone()));
                Ok(user)
            }
            _ => Err(ApiError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "Failed to get user data".to_string()),
            )),
        }
    }

    /// Ask the backend to mail a reset link
    pub async fn request_password_reset(&self, email: &str) -> ApiResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::Validation("Please enter your email".to_string()));
        }

        self.api
            .request(
                "/auth/forgot-password",
                RequestOptions::post(json!({ "email": email })),
            )
            .await
            .reported(&self.events, Resource::Auth, "Failed to send reset instructions")?;
        Ok(())
    }

    /// (Re)start the periodic refresh task
    pub fn start_token_refresh(&self) {
        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        let current_user = Arc::clone(&self.current_user);
        let interval = self.refresh_interval;

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match api.refresh_session().await {
                    Ok(()) => tracing::debug!("Periodic token refresh succeeded"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Periodic token refresh failed");
                        if let Err(e) = api.tokens().clear() {
                            tracing::error!(error = %e, "Failed to clear session tokens");
                        }
                        if let Ok(mut guard) = current_user.lock() {
                            *guard = None;
                        }
                        events.emit(AppEvent::SessionExpired);
                        break;
                    }
                }
            }
        });

        if let Ok(mut slot) = self.refresh_task.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    pub fn stop_token_refresh(&self) {
        if let Ok(mut slot) = self.refresh_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    pub fn is_refresh_running(&self) -> bool {
        self.refresh_task
            .lock()
            .map(|slot| slot.as_ref().map(|t| !t.is_finished()).unwrap_or(false))
            .unwrap_or(false)
    }

    fn clear_auth_data(&self) {
        if let Err(e) = self.api.tokens().clear() {
            tracing::error!(error = %e, "Failed to clear session tokens");
        }
        self.set_current_user(None);
        self.stop_token_refresh();
    }

    /// Email saved by "remember me"
    pub fn remembered_email(&self) -> Option<String> {
        self.store
            .get(&self.remember_email_key)
            .ok()
            .flatten()
            .filter(|e| !e.is_empty())
    }

    pub fn remember_email(&self, email: Option<&str>) {
        let result = match email {
            Some(email) => self.store.set(&self.remember_email_key, email),
            None => self.store.remove(&self.remember_email_key),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist remembered email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpMethod;
    use crate::events::EventKind;
    use crate::testing::{json_response, sample_user, sign_in, test_context};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn count(events: &EventBus, kind: EventKind) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        events.on(kind, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        counter
    }

    #[tokio::test]
    async fn test_login_success_stores_tokens_and_emits() {
        let (ctx, transport, _) = test_context();
        let logins = count(&ctx.events, EventKind::AuthLogin);
        transport.push(
            HttpMethod::Post,
            "/auth/login",
            json_response(
                200,
                json!({
                    "success": true,
                    "access_token": "a1",
                    "refresh_token": "r1",
                    "user": sample_user()
                }),
            ),
        );

        let user = ctx
            .services
            .auth
            .login("admin@bfp.gov.ph", "secret")
            .await
            .unwrap();

        assert_eq!(user.display_name(), "Station Admin");
        assert!(ctx.services.auth.is_authenticated());
        assert_eq!(ctx.api.tokens().refresh_token().as_deref(), Some("r1"));
        assert_eq!(ctx.services.auth.current_user(), Some(user));
        assert!(ctx.services.auth.is_refresh_running());
        assert_eq!(logins.load(Ordering::SeqCst), 1);

        let body = &transport.bodies(HttpMethod::Post, "/auth/login")[0];
        assert_eq!(body["email"], "admin@bfp.gov.ph");
        ctx.services.auth.stop_token_refresh();
    }

    #[tokio::test]
    async fn test_login_failure_emits_auth_error() {
        let (ctx, transport, _) = test_context();
        let errors = count(&ctx.events, EventKind::Error(Resource::Auth));
        transport.push(
            HttpMethod::Post,
            "/auth/login",
            json_response(401, json!({"success": false, "error": "Invalid email or password"})),
        );

        let err = ctx.services.auth.login("a@b.c", "wrong").await.unwrap_err();

        assert_eq!(err.message(), "Invalid email or password");
        assert!(!ctx.services.auth.is_authenticated());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(transport.count(HttpMethod::Post, "/auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_login_requires_both_fields_without_network() {
        let (ctx, transport, _) = test_context();
        let err = ctx.services.auth.login("  ", "x").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        let logouts = count(&ctx.events, EventKind::AuthLogout);
        transport.push(HttpMethod::Post, "/auth/logout", json_response(500, json!({})));

        ctx.services.auth.logout().await;

        assert!(!ctx.services.auth.is_authenticated());
        assert_eq!(logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_auth_falls_back_to_refresh() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        // /auth/me rejects twice: once before and once after the client's own refresh
        transport.push(HttpMethod::Get, "/auth/me", json_response(401, json!({})));
        transport.push(
            HttpMethod::Post,
            "/auth/refresh",
            json_response(200, json!({"success": true, "access_token": "a2"})),
        );
        transport.push(HttpMethod::Get, "/auth/me", json_response(200, json!({"success": false})));
        transport.push(
            HttpMethod::Post,
            "/auth/refresh",
            json_response(200, json!({"success": true, "access_token": "a3"})),
        );
        transport.push(
            HttpMethod::Get,
            "/auth/me",
            json_response(200, json!({"success": true, "user": sample_user()})),
        );

        assert!(ctx.services.auth.check_auth().await);
        assert_eq!(ctx.api.tokens().access_token().as_deref(), Some("a3"));
        assert_eq!(ctx.services.auth.current_user().unwrap().id, 1);
        ctx.services.auth.stop_token_refresh();
    }

    #[tokio::test]
    async fn test_check_auth_without_token_is_false() {
        let (ctx, transport, _) = test_context();
        assert!(!ctx.services.auth.check_auth().await);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_failure_expires_session() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        let expired = count(&ctx.events, EventKind::SessionExpired);
        transport.push(
            HttpMethod::Post,
            "/auth/refresh",
            json_response(200, json!({"success": true, "access_token": "a2"})),
        );
        transport.push(HttpMethod::Post, "/auth/refresh", json_response(401, json!({})));

        ctx.services.auth.start_token_refresh();
        tokio::time::sleep(Duration::from_secs(3300 * 2 + 5)).await;

        assert_eq!(transport.count(HttpMethod::Post, "/auth/refresh"), 2);
        assert!(!ctx.services.auth.is_authenticated());
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remembered_email_round_trip() {
        let (ctx, _, _) = test_context();
        ctx.services.auth.remember_email(Some("a@b.c"));
        assert_eq!(ctx.services.auth.remembered_email().as_deref(), Some("a@b.c"));
        ctx.services.auth.remember_email(None);
        assert!(ctx.services.auth.remembered_email().is_none());
    }
}
