//! Test doubles shared by the unit tests: a scripted HTTP transport, a fake
//! camera and a ready-made application context.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{
    percent, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartForm,
    ProgressCallback, TransportError,
};
use crate::app::AppContext;
use crate::config::{ApiConfig, Config};
use crate::face::{Camera, CameraError, Frame, MediaStream};
use crate::storage::MemoryStore;

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("application/json".to_string()),
        body: serde_json::to_vec(&body).unwrap(),
    }
}

#[derive(Clone)]
struct Scripted {
    response: HttpResponse,
    delay: Option<Duration>,
}

#[derive(Default)]
struct ScriptState {
    queued: HashMap<(HttpMethod, String), VecDeque<Scripted>>,
    fallback: HashMap<(HttpMethod, String), Scripted>,
    calls: Vec<HttpRequest>,
    uploads: Vec<MultipartForm>,
}

/// Transport answering from a script keyed by method and endpoint path
///
/// Queued responses are consumed in order; once a queue is empty the
/// `always` response for that endpoint is used, then a 404.
pub struct ScriptedTransport {
    base_url: String,
    state: Mutex<ScriptState>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            base_url: ApiConfig::default().base_url,
            state: Mutex::new(ScriptState::default()),
        }
    }

    pub fn push(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.enqueue(method, path, response, None);
    }

    pub fn push_delayed(
        &self,
        method: HttpMethod,
        path: &str,
        response: HttpResponse,
        delay: Duration,
    ) {
        self.enqueue(method, path, response, Some(delay));
    }

    fn enqueue(&self, method: HttpMethod, path: &str, response: HttpResponse, delay: Option<Duration>) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Scripted { response, delay });
    }

    /// Response used every time the queue for this endpoint is empty
    pub fn always(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.always_delayed(method, path, response, None);
    }

    pub fn always_delayed(
        &self,
        method: HttpMethod,
        path: &str,
        response: HttpResponse,
        delay: Option<Duration>,
    ) {
        self.state
            .lock()
            .unwrap()
            .fallback
            .insert((method, path.to_string()), Scripted { response, delay });
    }

    /// Every request seen so far, in order
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn uploads(&self) -> Vec<MultipartForm> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Number of requests made to `path` (query string ignored)
    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && self.path_of(&c.url) == path)
            .count()
    }

    /// Request bodies sent to `path`, decoded as JSON
    pub fn bodies(&self, method: HttpMethod, path: &str) -> Vec<serde_json::Value> {
        self.calls()
            .iter()
            .filter(|c| c.method == method && self.path_of(&c.url) == path)
            .filter_map(|c| c.body.as_ref())
            .filter_map(|b| serde_json::from_slice(b).ok())
            .collect()
    }

    /// Endpoint of a recorded request, query string included
    pub fn endpoint_of(&self, url: &str) -> String {
        url.strip_prefix(&self.base_url).unwrap_or(url).to_string()
    }

    fn path_of(&self, url: &str) -> String {
        let endpoint = self.endpoint_of(url);
        endpoint
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    fn next_response(&self, request: &HttpRequest) -> Scripted {
        let key = (request.method, self.path_of(&request.url));
        let mut state = self.state.lock().unwrap();
        state.calls.push(request.clone());

        if let Some(next) = state.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            return next;
        }
        if let Some(fallback) = state.fallback.get(&key) {
            return fallback.clone();
        }
        Scripted {
            response: json_response(
                404,
                serde_json::json!({"error": format!("No scripted response for {} {}", key.0, key.1)}),
            ),
            delay: None,
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let scripted = self.next_response(&request);
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(scripted.response)
    }

    async fn send_multipart(
        &self,
        request: HttpRequest,
        form: MultipartForm,
        progress: Option<ProgressCallback>,
    ) -> Result<HttpResponse, TransportError> {
        let total = form.file_bytes();
        self.state.lock().unwrap().uploads.push(form);
        let scripted = self.next_response(&request);

        if let Some(cb) = &progress {
            for quarter in 1..=4u64 {
                cb(percent(total * quarter / 4, total));
            }
        }
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(scripted.response)
    }
}

/// Camera whose frames are fixed bytes; may be told to deny access
pub struct FakeCamera {
    denied: bool,
    opened: Mutex<Vec<MediaStream>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            denied: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Streams handed out so far
    pub fn streams(&self) -> Vec<MediaStream> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn open(&self) -> Result<MediaStream, CameraError> {
        if self.denied {
            return Err(CameraError::PermissionDenied);
        }
        let stream = MediaStream::new("fake-camera");
        self.opened.lock().unwrap().push(stream.clone());
        Ok(stream)
    }

    async fn capture(&self, stream: &MediaStream) -> Result<Frame, CameraError> {
        if !stream.is_live() {
            return Err(CameraError::NotStarted);
        }
        Ok(Frame::jpeg(vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4]))
    }
}

/// Context over an in-memory store, the scripted transport and a fake camera
pub fn test_context() -> (Arc<AppContext>, Arc<ScriptedTransport>, Arc<FakeCamera>) {
    test_context_with(Config::default(), FakeCamera::new())
}

pub fn test_context_with(
    config: Config,
    camera: FakeCamera,
) -> (Arc<AppContext>, Arc<ScriptedTransport>, Arc<FakeCamera>) {
    let transport = Arc::new(ScriptedTransport::new());
    let camera = Arc::new(camera);
    let ctx = AppContext::new(
        config,
        Arc::new(MemoryStore::new()),
        transport.clone(),
        camera.clone(),
    );
    (ctx, transport, camera)
}

/// Store tokens so the context counts as signed in
pub fn sign_in(ctx: &AppContext) {
    ctx.api.tokens().set_tokens("access-token", Some("refresh-token")).unwrap();
}

pub fn sample_user() -> serde_json::Value {
    serde_json::json!({
        "id": 1,
        "username": "admin",
        "email": "admin@bfp.gov.ph",
        "name": "Station Admin",
        "role": "admin"
    })
}
