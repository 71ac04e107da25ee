//! Error boundary
//!
//! Mounted in place of a view whose construction or loading failed, so the
//! rest of the app stays usable.

use async_trait::async_trait;
use std::sync::Arc;

use super::not_found::home;
use super::{el, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::app::AppContext;

pub struct ErrorBoundaryView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    component: String,
    message: String,
}

impl ErrorBoundaryView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet, component: &str, message: &str) -> Self {
        tracing::error!(component, error = message, "View failed to mount");
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            component: component.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl View for ErrorBoundaryView {
    fn kind(&self) -> ViewKind {
        ViewKind::ErrorBoundary
    }

    fn render(&self) -> Node {
        el("div")
            .class("error-boundary")
            .child(el("h2").text("Something went wrong"))
            .child(
                el("p")
                    .text("There was an error rendering the ")
                    .child(el("strong").text(self.component.clone()))
                    .text(" component."),
            )
            .child(el("p").class("error-detail").text(self.message.clone()))
            .child(el("button").id("error-retry-btn").class("btn btn-outline-danger").text("Try Again"))
            .child(
                el("button")
                    .id("error-dashboard-btn")
                    .class("btn btn-primary")
                    .text("Go to Dashboard"),
            )
            .into()
    }

    fn attach(&mut self) {
        self.listeners.add(&self.outlet, UiEventKind::Click, "error-retry-btn");
        self.listeners.add(&self.outlet, UiEventKind::Click, "error-dashboard-btn");
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        Ok(match event.target() {
            "error-retry-btn" => ViewAction::Reload,
            "error-dashboard-btn" => ViewAction::Navigate(home(&self.ctx).to_string()),
            _ => ViewAction::None,
        })
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}
