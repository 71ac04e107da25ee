//! Application Event Types
//!
//! Every message published on the [`EventBus`](super::EventBus). Events are a
//! closed set; [`EventKind`] is the discriminant handlers subscribe to.

use serde::Serialize;

use crate::api::dto::{AttendanceType, Personnel, User};

/// Area of the application an error event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Api,
    Auth,
    Personnel,
    Attendance,
    Face,
    User,
    Settings,
    Report,
    View,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Api,
        Resource::Auth,
        Resource::Personnel,
        Resource::Attendance,
        Resource::Face,
        Resource::User,
        Resource::Settings,
        Resource::Report,
        Resource::View,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Api => "api",
            Resource::Auth => "auth",
            Resource::Personnel => "personnel",
            Resource::Attendance => "attendance",
            Resource::Face => "face",
            Resource::User => "user",
            Resource::Settings => "settings",
            Resource::Report => "report",
            Resource::View => "view",
        }
    }
}

/// Messages published on the event bus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // Session
    AuthLogin { user: User },
    AuthLogout,
    SessionExpired,

    // Personnel
    PersonnelCreated { personnel: Personnel },
    PersonnelUpdated { personnel: Personnel },
    PersonnelDeleted { id: u64 },
    PersonnelPhotoUpdated { id: u64 },

    // Attendance
    AttendanceRecorded {
        personnel_id: u64,
        attendance_type: AttendanceType,
    },
    AttendanceUpdated { id: u64 },
    AttendanceDeleted { id: u64 },

    // Face recognition
    FaceRegistered { personnel_id: u64 },
    FaceDeleted { face_id: u64 },

    // Users
    UserCreated { user: User },
    UserUpdated { user: User },
    UserDeleted { id: u64 },
    PasswordChanged,
    PasswordReset { id: u64 },
    ProfileUpdated { user: User },
    AvatarUpdated,

    // Settings
    SettingsUpdated { key: Option<String> },
    SettingsReset,
    SettingsImported,

    // Reports
    ReportScheduled { schedule: serde_json::Value },
    ReportScheduleDeleted { id: u64 },

    // Chrome
    ThemeChanged { theme: String },
    NavigationRequested { path: String },

    /// A failed operation, with a message fit for display
    Error { resource: Resource, message: String },
}

/// Discriminant of [`AppEvent`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AuthLogin,
    AuthLogout,
    SessionExpired,
    PersonnelCreated,
    PersonnelUpdated,
    PersonnelDeleted,
    PersonnelPhotoUpdated,
    AttendanceRecorded,
    AttendanceUpdated,
    AttendanceDeleted,
    FaceRegistered,
    FaceDeleted,
    UserCreated,
    UserUpdated,
    UserDeleted,
    PasswordChanged,
    PasswordReset,
    ProfileUpdated,
    AvatarUpdated,
    SettingsUpdated,
    SettingsReset,
    SettingsImported,
    ReportScheduled,
    ReportScheduleDeleted,
    ThemeChanged,
    NavigationRequested,
    Error(Resource),
}

impl EventKind {
    /// Wire-style name, e.g. `auth:session-expired` or `error:personnel`
    pub fn name(&self) -> String {
        let fixed = match self {
            EventKind::AuthLogin => "auth:login",
            EventKind::AuthLogout => "auth:logout",
            EventKind::SessionExpired => "auth:session-expired",
            EventKind::PersonnelCreated => "personnel:created",
            EventKind::PersonnelUpdated => "personnel:updated",
            EventKind::PersonnelDeleted => "personnel:deleted",
            EventKind::PersonnelPhotoUpdated => "personnel:photo-updated",
            EventKind::AttendanceRecorded => "attendance:recorded",
            EventKind::AttendanceUpdated => "attendance:updated",
            EventKind::AttendanceDeleted => "attendance:deleted",
            EventKind::FaceRegistered => "face:registered",
            EventKind::FaceDeleted => "face:deleted",
            EventKind::UserCreated => "user:created",
            EventKind::UserUpdated => "user:updated",
            EventKind::UserDeleted => "user:deleted",
            EventKind::PasswordChanged => "user:password-changed",
            EventKind::PasswordReset => "user:password-reset",
            EventKind::ProfileUpdated => "user:profile-updated",
            EventKind::AvatarUpdated => "user:avatar-updated",
            EventKind::SettingsUpdated => "settings:updated",
            EventKind::SettingsReset => "settings:reset",
            EventKind::SettingsImported => "settings:imported",
            EventKind::ReportScheduled => "report:scheduled",
            EventKind::ReportScheduleDeleted => "report:schedule-deleted",
            EventKind::ThemeChanged => "theme:changed",
            EventKind::NavigationRequested => "navigation:requested",
            EventKind::Error(resource) => return format!("error:{}", resource.as_str()),
        };
        fixed.to_string()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

impl AppEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AppEvent::AuthLogin { .. } => EventKind::AuthLogin,
            AppEvent::AuthLogout => EventKind::AuthLogout,
            AppEvent::SessionExpired => EventKind::SessionExpired,
            AppEvent::PersonnelCreated { .. } => EventKind::PersonnelCreated,
            AppEvent::PersonnelUpdated { .. } => EventKind::PersonnelUpdated,
            AppEvent::PersonnelDeleted { .. } => EventKind::PersonnelDeleted,
            AppEvent::PersonnelPhotoUpdated { .. } => EventKind::PersonnelPhotoUpdated,
            AppEvent::AttendanceRecorded { .. } => EventKind::AttendanceRecorded,
            AppEvent::AttendanceUpdated { .. } => EventKind::AttendanceUpdated,
            AppEvent::AttendanceDeleted { .. } => EventKind::AttendanceDeleted,
            AppEvent::FaceRegistered { .. } => EventKind::FaceRegistered,
            AppEvent::FaceDeleted { .. } => EventKind::FaceDeleted,
            AppEvent::UserCreated { .. } => EventKind::UserCreated,
            AppEvent::UserUpdated { .. } => EventKind::UserUpdated,
            AppEvent::UserDeleted { .. } => EventKind::UserDeleted,
            AppEvent::PasswordChanged => EventKind::PasswordChanged,
            AppEvent::PasswordReset { .. } => EventKind::PasswordReset,
            AppEvent::ProfileUpdated { .. } => EventKind::ProfileUpdated,
            AppEvent::AvatarUpdated => EventKind::AvatarUpdated,
            AppEvent::SettingsUpdated { .. } => EventKind::SettingsUpdated,
            AppEvent::SettingsReset => EventKind::SettingsReset,
            AppEvent::SettingsImported => EventKind::SettingsImported,
            AppEvent::ReportScheduled { .. } => EventKind::ReportScheduled,
            AppEvent::ReportScheduleDeleted { .. } => EventKind::ReportScheduleDeleted,
            AppEvent::ThemeChanged { .. } => EventKind::ThemeChanged,
            AppEvent::NavigationRequested { .. } => EventKind::NavigationRequested,
            AppEvent::Error { resource, .. } => EventKind::Error(*resource),
        }
    }

    /// Shorthand for an error event
    pub fn error(resource: Resource, message: impl Into<String>) -> Self {
        AppEvent::Error {
            resource,
            message: message.into(),
        }
    }
}
