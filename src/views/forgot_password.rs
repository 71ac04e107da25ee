//! Password reset request view

use async_trait::async_trait;
use std::sync::Arc;

use super::{el, input_value, notify_failure, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::app::AppContext;

pub struct ForgotPasswordView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    email: String,
    sent: bool,
}

impl ForgotPasswordView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            email: String::new(),
            sent: false,
        }
    }
}

#[async_trait]
impl View for ForgotPasswordView {
    fn kind(&self) -> ViewKind {
        ViewKind::ForgotPassword
    }

    fn render(&self) -> Node {
        let body = if self.sent {
            el("p")
                .id("reset-sent")
                .class("success-message")
                .text("If an account exists for that email, reset instructions have been sent.")
        } else {
            el("form")
                .id("forgot-form")
                .child(
                    el("input")
                        .id("forgot-email")
                        .attr("type", "email")
                        .attr("value", self.email.clone()),
                )
                .child(
                    el("button")
                        .class("btn btn-primary")
                        .attr("type", "submit")
                        .text("Send Reset Link"),
                )
        };

        el("div")
            .class("login-container")
            .child(
                el("div")
                    .class("login-card")
                    .child(el("h1").class("login-title").text("Forgot Password"))
                    .child(body)
                    .child(
                        el("a")
                            .attr("href", "#/login")
                            .class("back-to-login")
                            .text("Back to Login"),
                    ),
            )
            .into()
    }

    fn attach(&mut self) {
        self.listeners.add(&self.outlet, UiEventKind::Input, "forgot-email");
        self.listeners.add(&self.outlet, UiEventKind::Submit, "forgot-form");
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        match event.target() {
            "forgot-email" => self.email = input_value(&event).unwrap_or_default().to_string(),
            "forgot-form" => {
                match self.ctx.services.auth.request_password_reset(&self.email).await {
                    Ok(()) => self.sent = true,
                    Err(e) => notify_failure(&self.ctx, &e),
                }
            }
            _ => {}
        }
        Ok(ViewAction::None)
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}
