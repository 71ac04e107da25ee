//! Backend API Client
//!
//! Single gateway to the REST backend. Adds the bearer token, decodes JSON or
//! text bodies, turns non-2xx answers into [`ApiError`]s, and recovers from an
//! expired access token by refreshing once and retrying once.
//!
//! Token refresh is single-flight: concurrent requests that hit a 401 queue on
//! one async mutex, and a request that finds the token already rotated by a
//! sibling retries without refreshing again.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::dto::{AuthResponse, ErrorBody};
use super::error::{ApiError, ApiResult, DEFAULT_FAILURE_MESSAGE};
use super::transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartForm, ProgressCallback,
};
use crate::config::ApiConfig;
use crate::events::{AppEvent, EventBus};
use crate::session::TokenStore;

const REFRESH_ENDPOINT: &str = "/auth/refresh";
const LOGIN_ENDPOINT: &str = "/auth/login";
const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";

/// Decoded body of a successful response
#[derive(Debug, Clone, PartialEq)]
pub enum ApiPayload {
    Json(serde_json::Value),
    Text(String),
}

impl ApiPayload {
    pub fn into_json(self) -> serde_json::Value {
        match self {
            ApiPayload::Json(value) => value,
            ApiPayload::Text(text) => serde_json::Value::String(text),
        }
    }
}

/// Raw file returned by a download endpoint
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Method, body and extra headers of one request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::with_method(HttpMethod::Get, None)
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self::with_method(HttpMethod::Post, Some(body))
    }

    pub fn post_empty() -> Self {
        Self::with_method(HttpMethod::Post, None)
    }

    pub fn put(body: serde_json::Value) -> Self {
        Self::with_method(HttpMethod::Put, Some(body))
    }

    pub fn delete() -> Self {
        Self::with_method(HttpMethod::Delete, None)
    }

    fn with_method(method: HttpMethod, body: Option<serde_json::Value>) -> Self {
        Self {
            method,
            body,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// What gets sent: a JSON request or a multipart upload
#[derive(Clone)]
enum Outgoing {
    Plain(RequestOptions),
    Upload {
        form: MultipartForm,
        progress: Option<ProgressCallback>,
    },
}

impl Outgoing {
    fn method(&self) -> HttpMethod {
        match self {
            Outgoing::Plain(options) => options.method,
            Outgoing::Upload { .. } => HttpMethod::Post,
        }
    }
}

/// REST backend client
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenStore,
    events: EventBus,
    timeout: Duration,
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        transport: Arc<dyn HttpTransport>,
        tokens: TokenStore,
        events: EventBus,
    ) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            transport,
            tokens,
            events,
            timeout: Duration::from_secs(config.request_timeout_secs),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    /// Perform a request and decode the body
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> ApiResult<ApiPayload> {
        let response = self.dispatch(endpoint, Outgoing::Plain(options)).await?;
        decode(response)
    }

    /// Perform a request and deserialize the JSON body into `T`
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        match self.request(endpoint, options).await? {
            ApiPayload::Json(value) => Ok(serde_json::from_value(value)?),
            ApiPayload::Text(_) => Err(ApiError::Decode(format!(
                "expected JSON from {}",
                endpoint
            ))),
        }
    }

    /// Upload a multipart form, optionally reporting progress
    pub async fn upload_file(
        &self,
        endpoint: &str,
        form: MultipartForm,
        progress: Option<ProgressCallback>,
    ) -> ApiResult<ApiPayload> {
        let response = self
            .dispatch(endpoint, Outgoing::Upload { form, progress })
            .await?;
        decode(response)
    }

    /// Fetch a raw file (report exports)
    pub async fn download(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Download> {
        let response = self.dispatch(endpoint, Outgoing::Plain(options)).await?;
        Ok(Download {
            bytes: response.body,
            content_type: response.content_type,
        })
    }

    /// Exchange the refresh token for a new access token
    pub async fn refresh_session(&self) -> ApiResult<()> {
        let _guard = self.refresh_lock.lock().await;
        self.exchange_refresh_token().await
    }

    /// Send with the 401 policy applied; returns a 2xx response or an error
    async fn dispatch(&self, endpoint: &str, outgoing: Outgoing) -> ApiResult<HttpResponse> {
        let token = self.tokens.access_token();
        let response = self.send_once(endpoint, &outgoing, token.as_deref()).await?;

        if response.status == 401 && refresh_applies(endpoint, &outgoing) {
            tracing::info!(endpoint = %endpoint, "Access token rejected, refreshing session");
            self.recover_session(token.as_deref(), &response).await?;

            let retry_token = self.tokens.access_token();
            let retried = self
                .send_once(endpoint, &outgoing, retry_token.as_deref())
                .await?;
            return ensure_success(endpoint, retried);
        }

        ensure_success(endpoint, response)
    }

    /// Make sure a fresh access token is in place, refreshing at most once
    /// across all concurrent callers
    async fn recover_session(&self, stale: Option<&str>, rejected: &HttpResponse) -> ApiResult<()> {
        let _guard = self.refresh_lock.lock().await;

        match (self.tokens.access_token(), stale) {
            (Some(current), stale) if Some(current.as_str()) != stale => {
                tracing::debug!("Token already rotated by a concurrent refresh");
                return Ok(());
            }
            (None, Some(_)) => {
                // a concurrent refresh failed and already tore the session down
                return Err(ApiError::SessionExpired(expired_message(rejected)));
            }
            _ => {}
        }

        match self.exchange_refresh_token().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Session refresh failed");
                if let Err(e) = self.tokens.clear() {
                    tracing::error!(error = %e, "Failed to clear session tokens");
                }
                self.events.emit(AppEvent::SessionExpired);
                Err(ApiError::SessionExpired(expired_message(rejected)))
            }
        }
    }

    /// POST `/auth/refresh`; caller holds the refresh lock
    async fn exchange_refresh_token(&self) -> ApiResult<()> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or_else(|| ApiError::SessionExpired("No refresh token".to_string()))?;

        let options = RequestOptions::post_empty()
            .with_header("Authorization", format!("Bearer {}", refresh_token));
        let response = self
            .send_once(REFRESH_ENDPOINT, &Outgoing::Plain(options), None)
            .await?;
        let response = ensure_success(REFRESH_ENDPOINT, response)?;

        let auth: AuthResponse = serde_json::from_slice(&response.body)?;
        match (auth.success, auth.access_token) {
            (true, Some(access)) => {
                self.tokens
                    .set_tokens(&access, auth.refresh_token.as_deref())?;
                tracing::info!("Session refreshed");
                Ok(())
            }
            _ => Err(ApiError::Rejected(
                auth.error
                    .unwrap_or_else(|| "Token refresh failed".to_string()),
            )),
        }
    }

    /// One round trip, bounded by the client timeout
    async fn send_once(
        &self,
        endpoint: &str,
        outgoing: &Outgoing,
        token: Option<&str>,
    ) -> ApiResult<HttpResponse> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = HttpRequest::new(outgoing.method(), format!("{}{}", self.base_url, endpoint));
        request
            .headers
            .push(("Accept".to_string(), "application/json".to_string()));
        request
            .headers
            .push(("X-Request-Id".to_string(), request_id.clone()));

        let explicit_auth = match outgoing {
            Outgoing::Plain(options) => {
                request.headers.extend(options.headers.iter().cloned());
                options.has_header("Authorization")
            }
            Outgoing::Upload { .. } => false,
        };
        if !explicit_auth {
            if let Some(token) = token {
                request
                    .headers
                    .push(("Authorization".to_string(), format!("Bearer {}", token)));
            }
        }

        tracing::debug!(
            request_id = %request_id,
            method = %request.method,
            endpoint = %endpoint,
            "API request"
        );

        if let Outgoing::Plain(RequestOptions {
            body: Some(body), ..
        }) = outgoing
        {
            request
                .headers
                .push(("Content-Type".to_string(), "application/json".to_string()));
            request.body = Some(serde_json::to_vec(body)?);
        }

        let call = async move {
            match outgoing {
                Outgoing::Plain(_) => self.transport.send(request).await,
                Outgoing::Upload { form, progress } => {
                    self.transport
                        .send_multipart(request, form.clone(), progress.clone())
                        .await
                }
            }
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => {
                tracing::debug!(request_id = %request_id, status = response.status, "API response");
                Ok(response)
            }
            Ok(Err(e)) => {
                tracing::warn!(request_id = %request_id, endpoint = %endpoint, error = %e, "API request failed");
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(request_id = %request_id, endpoint = %endpoint, "API request timed out");
                Err(ApiError::Timeout(self.timeout))
            }
        }
    }
}

/// The refresh endpoint itself and login never trigger a refresh
fn refresh_applies(endpoint: &str, outgoing: &Outgoing) -> bool {
    let explicit_auth = matches!(outgoing, Outgoing::Plain(o) if o.has_header("Authorization"));
    endpoint != REFRESH_ENDPOINT && endpoint != LOGIN_ENDPOINT && !explicit_auth
}

fn ensure_success(endpoint: &str, response: HttpResponse) -> ApiResult<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let message = error_message(&response);
    tracing::warn!(endpoint = %endpoint, status = response.status, error = %message, "API error response");
    Err(ApiError::Status {
        status: response.status,
        message,
    })
}

/// The backend's `error` field, or the generic failure text
fn error_message(response: &HttpResponse) -> String {
    serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string())
}

fn expired_message(response: &HttpResponse) -> String {
    serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string())
}

fn decode(response: HttpResponse) -> ApiResult<ApiPayload> {
    if response.is_json() {
        if response.body.is_empty() {
            return Ok(ApiPayload::Json(serde_json::Value::Null));
        }
        Ok(ApiPayload::Json(serde_json::from_slice(&response.body)?))
    } else {
        Ok(ApiPayload::Text(response.text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::testing::{json_response, ScriptedTransport};
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        client: Arc<ApiClient>,
        transport: Arc<ScriptedTransport>,
        tokens: TokenStore,
        events: EventBus,
    }

    fn harness() -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let tokens = TokenStore::new(
            Arc::new(MemoryStore::new()),
            &crate::config::StorageConfig::default(),
        );
        let events = EventBus::new();
        let client = Arc::new(ApiClient::new(
            &ApiConfig::default(),
            transport.clone(),
            tokens.clone(),
            events.clone(),
        ));
        Harness {
            client,
            transport,
            tokens,
            events,
        }
    }

    fn count_session_expired(events: &EventBus) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        events.on(EventKind::SessionExpired, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        count
    }

    #[tokio::test]
    async fn test_adds_bearer_token_and_decodes_json() {
        let h = harness();
        h.tokens.set_tokens("access-1", Some("refresh-1")).unwrap();
        h.transport.push(
            HttpMethod::Get,
            "/personnel",
            json_response(200, serde_json::json!({"data": []})),
        );

        let payload = h
            .client
            .request("/personnel", RequestOptions::get())
            .await
            .unwrap();

        assert_eq!(payload, ApiPayload::Json(serde_json::json!({"data": []})));
        let calls = h.transport.calls();
        assert_eq!(calls[0].header("Authorization"), Some("Bearer access-1"));
        assert!(calls[0].header("X-Request-Id").is_some());
    }

    #[tokio::test]
    async fn test_non_json_body_is_returned_as_text() {
        let h = harness();
        h.transport.push(
            HttpMethod::Get,
            "/health",
            HttpResponse {
                status: 200,
                content_type: Some("text/plain".to_string()),
                body: b"ok".to_vec(),
            },
        );

        let payload = h.client.request("/health", RequestOptions::get()).await.unwrap();
        assert_eq!(payload, ApiPayload::Text("ok".to_string()));
    }

    #[tokio::test]
    async fn test_error_uses_backend_message_or_fallback() {
        let h = harness();
        h.transport.push(
            HttpMethod::Post,
            "/personnel",
            json_response(400, serde_json::json!({"error": "Name is required"})),
        );
        h.transport.push(
            HttpMethod::Get,
            "/reports",
            HttpResponse {
                status: 500,
                content_type: Some("text/html".to_string()),
                body: b"<h1>oops</h1>".to_vec(),
            },
        );

        let err = h
            .client
            .request("/personnel", RequestOptions::post(serde_json::json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Name is required");

        let err = h.client.request("/reports", RequestOptions::get()).await.unwrap_err();
        assert_eq!(err.message(), "API request failed");
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_retries_once() {
        let h = harness();
        h.tokens.set_tokens("old", Some("refresh-1")).unwrap();
        h.transport.push(
            HttpMethod::Get,
            "/attendance",
            json_response(401, serde_json::json!({"error": "Token expired"})),
        );
        h.transport.push(
            HttpMethod::Post,
            "/auth/refresh",
            json_response(200, serde_json::json!({"success": true, "access_token": "new"})),
        );
        h.transport.push(
            HttpMethod::Get,
            "/attendance",
            json_response(200, serde_json::json!({"data": [1]})),
        );

        let payload = h
            .client
            .request("/attendance", RequestOptions::get())
            .await
            .unwrap();

        assert_eq!(payload.into_json()["data"][0], 1);
        assert_eq!(h.transport.count(HttpMethod::Post, "/auth/refresh"), 1);
        assert_eq!(h.transport.count(HttpMethod::Get, "/attendance"), 2);

        let calls = h.transport.calls();
        assert_eq!(calls[1].header("Authorization"), Some("Bearer refresh-1"));
        assert_eq!(calls[2].header("Authorization"), Some("Bearer new"));
        assert_eq!(h.tokens.access_token().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_second_401_after_refresh_is_not_refreshed_again() {
        let h = harness();
        h.tokens.set_tokens("old", Some("refresh-1")).unwrap();
        h.transport.push(HttpMethod::Get, "/users", json_response(401, serde_json::json!({})));
        h.transport.push(
            HttpMethod::Post,
            "/auth/refresh",
            json_response(200, serde_json::json!({"success": true, "access_token": "new"})),
        );
        h.transport.push(
            HttpMethod::Get,
            "/users",
            json_response(401, serde_json::json!({"error": "Forbidden"})),
        );

        let err = h.client.request("/users", RequestOptions::get()).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(h.transport.count(HttpMethod::Post, "/auth/refresh"), 1);
        assert_eq!(h.transport.count(HttpMethod::Get, "/users"), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_expires_session() {
        let h = harness();
        let expired = count_session_expired(&h.events);
        h.tokens.set_tokens("old", Some("refresh-1")).unwrap();
        h.transport.push(HttpMethod::Get, "/personnel", json_response(401, serde_json::json!({})));
        h.transport.push(
            HttpMethod::Post,
            "/auth/refresh",
            json_response(401, serde_json::json!({"error": "Refresh token expired"})),
        );

        let err = h
            .client
            .request("/personnel", RequestOptions::get())
            .await
            .unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(err.message(), "Session expired. Please log in again.");
        assert!(!h.tokens.is_authenticated());
        assert!(h.tokens.refresh_token().is_none());
        assert_eq!(expired.load(Ordering::SeqCst), 1);
        assert_eq!(h.transport.count(HttpMethod::Get, "/personnel"), 1);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_expires_without_refresh_call() {
        let h = harness();
        let expired = count_session_expired(&h.events);
        h.tokens.set_access_token("old").unwrap();
        h.transport.push(HttpMethod::Get, "/personnel", json_response(401, serde_json::json!({})));

        let err = h
            .client
            .request("/personnel", RequestOptions::get())
            .await
            .unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(h.transport.count(HttpMethod::Post, "/auth/refresh"), 0);
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_401_does_not_refresh() {
        let h = harness();
        h.transport.push(
            HttpMethod::Post,
            "/auth/login",
            json_response(401, serde_json::json!({"error": "Invalid credentials"})),
        );

        let err = h
            .client
            .request("/auth/login", RequestOptions::post(serde_json::json!({})))
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Invalid credentials");
        assert_eq!(h.transport.count(HttpMethod::Post, "/auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let h = harness();
        h.tokens.set_tokens("old", Some("refresh-1")).unwrap();
        for _ in 0..3 {
            h.transport.push(HttpMethod::Get, "/attendance", json_response(401, serde_json::json!({})));
        }
        h.transport.push_delayed(
            HttpMethod::Post,
            "/auth/refresh",
            json_response(200, serde_json::json!({"success": true, "access_token": "new"})),
            Duration::from_millis(50),
        );
        for _ in 0..3 {
            h.transport.push(HttpMethod::Get, "/attendance", json_response(200, serde_json::json!({})));
        }

        let (a, b, c) = tokio::join!(
            h.client.request("/attendance", RequestOptions::get()),
            h.client.request("/attendance", RequestOptions::get()),
            h.client.request("/attendance", RequestOptions::get()),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(h.transport.count(HttpMethod::Post, "/auth/refresh"), 1);
        assert_eq!(h.transport.count(HttpMethod::Get, "/attendance"), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_time_out() {
        let h = harness();
        h.transport.push_delayed(
            HttpMethod::Get,
            "/reports/templates",
            json_response(200, serde_json::json!({})),
            Duration::from_secs(60),
        );

        let err = h
            .client
            .request("/reports/templates", RequestOptions::get())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_upload_reports_progress_to_100() {
        let h = harness();
        h.tokens.set_tokens("t", None).unwrap();
        h.transport.push(
            HttpMethod::Post,
            "/personnel/3/face",
            json_response(200, serde_json::json!({"success": true})),
        );

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let progress: ProgressCallback = Arc::new(move |p| seen_clone.lock().unwrap().push(p));
        let form = MultipartForm::new().file("image", "face.jpg", "image/jpeg", vec![1u8; 4096]);

        h.client
            .upload_file("/personnel/3/face", form, Some(progress))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
        assert_eq!(
            h.transport.calls()[0].header("Authorization"),
            Some("Bearer t")
        );
    }

    #[tokio::test]
    async fn test_download_returns_raw_bytes() {
        let h = harness();
        h.transport.push(
            HttpMethod::Post,
            "/reports/attendance",
            HttpResponse {
                status: 200,
                content_type: Some("application/pdf".to_string()),
                body: b"%PDF-1.4".to_vec(),
            },
        );

        let file = h
            .client
            .download("/reports/attendance", RequestOptions::post(serde_json::json!({"format": "pdf"})))
            .await
            .unwrap();

        assert_eq!(file.bytes, b"%PDF-1.4");
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    }
}
