//! View Components
//!
//! One view per route. A view is built by [`ComponentFactory`] into an
//! [`Outlet`], registers the interactions it handles on that outlet, loads
//! its data, and renders a [`Node`] tree from its own state. `destroy` must
//! leave the outlet empty with no listeners and release any camera stream
//! or background task the view started.
//!
//! - **node**: declarative markup
//! - **outlet**: the mount point and UI event gating
//! - **boundary**: fallback panel for views that fail to mount

pub mod node;
pub mod outlet;

mod attendance;
mod boundary;
mod dashboard;
mod forgot_password;
mod login;
mod not_found;
mod pagination;
mod personnel;
mod personnel_form;
mod profile;
mod records;
mod reports;
mod settings;

pub use attendance::AttendanceView;
pub use boundary::ErrorBoundaryView;
pub use dashboard::DashboardView;
pub use forgot_password::ForgotPasswordView;
pub use login::LoginView;
pub use node::{el, text, Element, Node};
pub use not_found::NotFoundView;
pub use outlet::{row_id, ListenerId, Listeners, Outlet, UiEvent, UiEventKind};
pub use personnel::PersonnelView;
pub use personnel_form::PersonnelFormView;
pub use profile::ProfileView;
pub use records::RecordsView;
pub use reports::ReportsView;
pub use settings::SettingsView;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::api::ApiError;
use crate::app::AppContext;
use crate::face::CameraError;
use crate::router::RouteParams;
use crate::services::SettingsError;

/// Every view the router can mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Login,
    ForgotPassword,
    Dashboard,
    Attendance,
    AttendanceRecords,
    Personnel,
    PersonnelAdd,
    PersonnelEdit,
    Reports,
    Settings,
    Profile,
    NotFound,
    ErrorBoundary,
}

impl ViewKind {
    pub fn name(&self) -> &'static str {
        match self {
            ViewKind::Login => "login",
            ViewKind::ForgotPassword => "forgotPassword",
            ViewKind::Dashboard => "dashboard",
            ViewKind::Attendance => "attendance",
            ViewKind::AttendanceRecords => "attendanceRecords",
            ViewKind::Personnel => "personnel",
            ViewKind::PersonnelAdd | ViewKind::PersonnelEdit => "personnelForm",
            ViewKind::Reports => "reports",
            ViewKind::Settings => "settings",
            ViewKind::Profile => "userProfile",
            ViewKind::NotFound => "notFound",
            ViewKind::ErrorBoundary => "errorBoundary",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the router should do after a view handled an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    None,
    /// Go to a fragment such as `/personnel/edit?id=4`
    Navigate(String),
    /// Go back to the previous location
    Back,
    /// Mount the current location again
    Reload,
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Missing or invalid parameter: {0}")]
    InvalidParam(String),

    #[error("View panicked: {0}")]
    Panicked(String),
}

pub type ViewResult<T> = Result<T, ViewError>;

/// Lifecycle every routed view follows
#[async_trait]
pub trait View: Send {
    fn kind(&self) -> ViewKind;

    /// Markup for the current state
    fn render(&self) -> Node;

    /// Register the outlet listeners this view handles
    fn attach(&mut self);

    /// Fetch whatever the view shows; called once after the first render
    async fn load(&mut self) -> ViewResult<()> {
        Ok(())
    }

    /// React to an interaction the outlet let through
    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction>;

    /// Release listeners, timers and devices, and empty the outlet
    fn destroy(&mut self);
}

/// Builds the view for a route
pub struct ComponentFactory;

impl ComponentFactory {
    pub fn create(
        kind: ViewKind,
        ctx: Arc<AppContext>,
        outlet: Outlet,
        params: RouteParams,
    ) -> ViewResult<Box<dyn View>> {
        tracing::debug!(view = kind.name(), "Creating view");

        let view: Box<dyn View> = match kind {
            ViewKind::Login => Box::new(LoginView::new(ctx, outlet, params)),
            ViewKind::ForgotPassword => Box::new(ForgotPasswordView::new(ctx, outlet)),
            ViewKind::Dashboard => Box::new(DashboardView::new(ctx, outlet)),
            ViewKind::Attendance => Box::new(AttendanceView::new(ctx, outlet)),
            ViewKind::AttendanceRecords => Box::new(RecordsView::new(ctx, outlet, params)),
            ViewKind::Personnel => Box::new(PersonnelView::new(ctx, outlet, params)),
            ViewKind::PersonnelAdd => Box::new(PersonnelFormView::add(ctx, outlet)),
            ViewKind::PersonnelEdit => Box::new(PersonnelFormView::edit(ctx, outlet, &params)?),
            ViewKind::Reports => Box::new(ReportsView::new(ctx, outlet)),
            ViewKind::Settings => Box::new(SettingsView::new(ctx, outlet)),
            ViewKind::Profile => Box::new(ProfileView::new(ctx, outlet)),
            ViewKind::NotFound => Box::new(NotFoundView::new(ctx, outlet)),
            ViewKind::ErrorBoundary => Box::new(ErrorBoundaryView::new(
                ctx,
                outlet,
                "Unknown component",
                "No view to show",
            )),
        };
        Ok(view)
    }
}

/// Toast for failures no service has announced already
pub(crate) fn notify_failure(ctx: &AppContext, error: &ApiError) {
    if matches!(error, ApiError::Validation(_)) {
        ctx.ui.notifications().error(error.message());
    }
}

/// Current value of a form input
pub(crate) fn input_value(event: &UiEvent) -> Option<&str> {
    match event {
        UiEvent::Input { value, .. } => Some(value),
        _ => None,
    }
}

/// Common page frame: heading plus body
pub(crate) fn page(class: &str, title: &str) -> Element {
    el("div")
        .class(class)
        .child(el("h1").class("page-title").text(title))
}
