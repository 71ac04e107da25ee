//! Backend REST API
//!
//! Client side of the attendance backend, rooted at `[api] base_url`.
//!
//! # Endpoints used
//!
//! ## Auth
//! - `POST /auth/login`, `POST /auth/logout`, `POST /auth/refresh`, `GET /auth/me`
//! - `POST /auth/forgot-password`
//!
//! ## Personnel
//! - `GET|POST /personnel`, `GET|PUT|DELETE /personnel/:id`
//! - `POST /personnel/:id/photo`, `GET /personnel/statistics`
//!
//! ## Attendance
//! - `GET|POST /attendance`, `GET|PUT|DELETE /attendance/:id`
//! - `GET /personnel/:id/attendance`, `POST /attendance/face-recognition`
//! - `GET /attendance/statistics`, `GET|POST /attendance/report`
//!
//! ## Face recognition
//! - `POST /face/detect`, `GET /face/statistics`
//! - `POST /personnel/:id/face`, `GET /personnel/:id/faces`
//! - `DELETE /personnel/:id/face/:face_id`
//!
//! ## Users, settings, reports
//! - `/users`, `/users/:id`, `/users/:id/password`, `/users/:id/reset-password`
//! - `/users/profile`, `/users/avatar`, `/users/:id/activity-logs`
//! - `GET|PUT /settings`
//! - `GET|POST /reports/{attendance,personnel,activity}`, `/reports/templates`
//! - `GET|POST /reports/schedule`, `DELETE /reports/schedule/:id`
//!
//! # Example
//!
//! ```rust,ignore
//! use rollcall::api::{ApiClient, ReqwestTransport, RequestOptions};
//!
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(30))?);
//! let client = ApiClient::new(&config.api, transport, tokens, events);
//! let me = client.request("/auth/me", RequestOptions::get()).await?;
//! ```

mod client;
pub mod dto;
mod error;
mod transport;

pub use client::{ApiClient, ApiPayload, Download, RequestOptions};
pub use error::{ApiError, ApiResult, DEFAULT_FAILURE_MESSAGE};
pub use transport::{
    percent, FormPart, HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartForm,
    ProgressCallback, ReqwestTransport, TransportError,
};
