//! Domain Services
//!
//! Thin wrappers over [`ApiClient`](crate::api::ApiClient), one per backend
//! resource. A successful mutation publishes `<resource>:<action>`; a failure
//! publishes `error:<resource>` with a display message and the original error
//! is returned to the caller.

mod attendance;
mod auth;
mod face;
mod notification;
mod personnel;
mod query;
mod report;
mod settings;
mod user;

pub use attendance::AttendanceService;
pub use auth::AuthService;
pub use face::FaceService;
pub use notification::{NotificationService, Severity, Toast, ToastId, ToastQueue};
pub use personnel::PersonnelService;
pub use query::QueryParams;
pub use report::{ReportFile, ReportFormat, ReportKind, ReportOutput, ReportService};
pub use settings::{default_settings, SettingsError, SettingsService};
pub use user::UserService;

use crate::api::ApiResult;
use crate::events::{AppEvent, EventBus, Resource};

/// Publish `error:<resource>` for a failed call and pass the error on
pub(crate) trait Reported<T> {
    fn reported(self, events: &EventBus, resource: Resource, message: &str) -> ApiResult<T>;
}

impl<T> Reported<T> for ApiResult<T> {
    fn reported(self, events: &EventBus, resource: Resource, message: &str) -> ApiResult<T> {
        self.map_err(|e| {
            tracing::error!(resource = resource.as_str(), error = %e, "{}", message);
            // an expired session has its own notice
            if !e.is_session_expired() {
                events.emit(AppEvent::error(resource, message));
            }
            e
        })
    }
}
