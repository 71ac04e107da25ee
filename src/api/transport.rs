//! HTTP Transport
//!
//! The seam between [`ApiClient`](super::ApiClient) and the network. The
//! client builds [`HttpRequest`]s and interprets [`HttpResponse`]s; a
//! transport only moves bytes. [`ReqwestTransport`] is the production
//! implementation.

use async_trait::async_trait;
use futures_util::stream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upload progress callback, called with a percentage in `0..=100`
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Size of the chunks file uploads are streamed in
const UPLOAD_CHUNK_SIZE: usize = 16 * 1024;

/// HTTP verbs used by the backend API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as seen by the client
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One field of a multipart form
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Multipart form body for file uploads
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            filename: filename.into(),
            mime: mime.into(),
            bytes,
        });
        self
    }

    /// Total size of all file parts
    pub fn file_bytes(&self) -> u64 {
        self.parts
            .iter()
            .map(|p| match p {
                FormPart::File { bytes, .. } => bytes.len() as u64,
                FormPart::Text { .. } => 0,
            })
            .sum()
    }
}

/// Failures below the HTTP layer
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Backend unreachable: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Moves requests to the backend
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Send a multipart upload, reporting progress while the body is sent
    async fn send_multipart(
        &self,
        request: HttpRequest,
        form: MultipartForm,
        progress: Option<ProgressCallback>,
    ) -> Result<HttpResponse, TransportError>;
}

/// Production transport over reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { client })
    }

    fn builder(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<HttpResponse, TransportError> {
        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

/// Percentage of `sent` over `total`, clamped to 100
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) * 100) / total) as u8
}

/// Body stream over `bytes` that reports cumulative progress as chunks are pulled
fn progress_body(
    bytes: Vec<u8>,
    sent: Arc<AtomicU64>,
    total: u64,
    progress: Option<ProgressCallback>,
) -> reqwest::Body {
    let chunks: Vec<Vec<u8>> = bytes
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(|c| c.to_vec())
        .collect();

    let stream = stream::iter(chunks.into_iter().map(move |chunk| {
        let so_far = sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
        if let Some(cb) = &progress {
            cb(percent(so_far, total));
        }
        Ok::<_, std::io::Error>(chunk)
    }));

    reqwest::Body::wrap_stream(stream)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.builder(&request);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        self.execute(builder).await
    }

    async fn send_multipart(
        &self,
        request: HttpRequest,
        form: MultipartForm,
        progress: Option<ProgressCallback>,
    ) -> Result<HttpResponse, TransportError> {
        let total = form.file_bytes();
        let sent = Arc::new(AtomicU64::new(0));
        let mut multipart = reqwest::multipart::Form::new();

        for part in form.parts {
            multipart = match part {
                FormPart::Text { name, value } => multipart.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    mime,
                    bytes,
                } => {
                    let len = bytes.len() as u64;
                    let body = progress_body(bytes, Arc::clone(&sent), total, progress.clone());
                    let file_part = reqwest::multipart::Part::stream_with_length(body, len)
                        .file_name(filename)
                        .mime_str(&mime)
                        .map_err(|e| TransportError::Request(e.to_string()))?;
                    multipart.part(name, file_part)
                }
            };
        }

        let response = self.execute(self.builder(&request).multipart(multipart)).await?;
        if let Some(cb) = &progress {
            cb(100);
        }
        Ok(response)
    }
}
