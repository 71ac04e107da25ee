//! 404 view

use async_trait::async_trait;
use std::sync::Arc;

use super::{el, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::app::AppContext;

pub struct NotFoundView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
}

impl NotFoundView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
        }
    }
}

#[async_trait]
impl View for NotFoundView {
    fn kind(&self) -> ViewKind {
        ViewKind::NotFound
    }

    fn render(&self) -> Node {
        el("div")
            .class("not-found-page")
            .child(el("span").class("error-code").text("404"))
            .child(el("h1").text("Page Not Found"))
            .child(el("p").text("The page you are looking for does not exist or has been moved."))
            .child(el("button").id("go-back-btn").class("btn btn-outline").text("Go Back"))
            .child(
                el("button")
                    .id("go-home-btn")
                    .class("btn btn-primary")
                    .text("Go to Dashboard"),
            )
            .into()
    }

    fn attach(&mut self) {
        self.listeners.add(&self.outlet, UiEventKind::Click, "go-back-btn");
        self.listeners.add(&self.outlet, UiEventKind::Click, "go-home-btn");
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        Ok(match event.target() {
            "go-back-btn" => ViewAction::Back,
            "go-home-btn" => ViewAction::Navigate(home(&self.ctx).to_string()),
            _ => ViewAction::None,
        })
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}

/// Dashboard when signed in, login otherwise
pub(crate) fn home(ctx: &AppContext) -> &'static str {
    if ctx.services.auth.is_authenticated() {
        "/dashboard"
    } else {
        "/login"
    }
}
