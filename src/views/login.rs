//! Login view

use async_trait::async_trait;
use std::sync::Arc;

use super::{el, input_value, notify_failure, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::api::ApiError;
use crate::app::AppContext;
use crate::router::RouteParams;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn looks_like_email(email: &str) -> bool {
    regex::Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(email))
        .unwrap_or(true)
}

pub struct LoginView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    return_url: Option<String>,
    email: String,
    password: String,
    remember: bool,
    show_password: bool,
    submitting: bool,
    failed: bool,
}

impl LoginView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet, params: RouteParams) -> Self {
        let remembered = ctx.services.auth.remembered_email();
        Self {
            return_url: params.get("returnUrl").filter(|u| !u.is_empty()).cloned(),
            remember: remembered.is_some(),
            email: remembered.unwrap_or_default(),
            password: String::new(),
            show_password: false,
            submitting: false,
            failed: false,
            listeners: Listeners::new(),
            ctx,
            outlet,
        }
    }

    async fn submit(&mut self) -> ViewResult<ViewAction> {
        let email = self.email.trim().to_string();
        if !email.is_empty() && !looks_like_email(&email) {
            let err = ApiError::Validation("Please enter a valid email address".to_string());
            notify_failure(&self.ctx, &err);
            self.failed = true;
            return Ok(ViewAction::None);
        }

        self.submitting = true;
        let result = self.ctx.services.auth.login(&email, &self.password).await;
        self.submitting = false;

        match result {
            Ok(_) => {
                self.failed = false;
                self.ctx.ui.notifications().success("Login successful");
                self.ctx
                    .services
                    .auth
                    .remember_email(self.remember.then_some(email.as_str()));
                let target = self
                    .return_url
                    .clone()
                    .unwrap_or_else(|| "/dashboard".to_string());
                Ok(ViewAction::Navigate(target))
            }
            Err(e) => {
                tracing::debug!(error = %e, "Login rejected");
                notify_failure(&self.ctx, &e);
                self.failed = true;
                self.password.clear();
                Ok(ViewAction::None)
            }
        }
    }
}

#[async_trait]
impl View for LoginView {
    fn kind(&self) -> ViewKind {
        ViewKind::Login
    }

    fn render(&self) -> Node {
        let card_class = if self.failed { "login-card shake" } else { "login-card" };
        let app_title = self.ctx.ui.app_title().to_string();

        el("div")
            .class("login-container")
            .child(
                el("div")
                    .class(card_class)
                    .child(
                        el("div")
                            .class("login-header")
                            .child(el("h1").class("login-title").text(app_title))
                            .child(
                                el("p")
                                    .class("login-subtitle")
                                    .text("Face Recognition Attendance System"),
                            ),
                    )
                    .child(
                        el("form")
                            .id("login-form")
                            .child(
                                el("input")
                                    .id("login-email")
                                    .attr("type", "email")
                                    .attr("placeholder", "Enter your email")
                                    .attr("value", self.email.clone()),
                            )
                            .child(
                                el("input")
                                    .id("login-password")
                                    .attr(
                                        "type",
                                        if self.show_password { "text" } else { "password" },
                                    )
                                    .attr("placeholder", "Enter your password"),
                            )
                            .child(el("button").id("password-toggle").text(
                                if self.show_password { "Hide" } else { "Show" },
                            ))
                            .child(
                                el("input")
                                    .id("login-remember")
                                    .attr("type", "checkbox")
                                    .flag("checked", self.remember),
                            )
                            .child(
                                el("a")
                                    .class("forgot-password")
                                    .attr("href", "#/forgot-password")
                                    .text("Forgot Password?"),
                            )
                            .child(
                                el("button")
                                    .class("btn btn-primary btn-login")
                                    .attr("type", "submit")
                                    .flag("disabled", self.submitting)
                                    .text("Login"),
                            ),
                    ),
            )
            .into()
    }

    fn attach(&mut self) {
        self.listeners.add(&self.outlet, UiEventKind::Input, "login-email");
        self.listeners.add(&self.outlet, UiEventKind::Input, "login-password");
        self.listeners.add(&self.outlet, UiEventKind::Click, "login-remember");
        self.listeners.add(&self.outlet, UiEventKind::Click, "password-toggle");
        self.listeners.add(&self.outlet, UiEventKind::Submit, "login-form");
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        match event.target() {
            "login-email" => {
                self.email = input_value(&event).unwrap_or_default().to_string();
            }
            "login-password" => {
                self.password = input_value(&event).unwrap_or_default().to_string();
            }
            "login-remember" => self.remember = !self.remember,
            "password-toggle" => self.show_password = !self.show_password,
            "login-form" => return self.submit().await,
            _ => {}
        }
        Ok(ViewAction::None)
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpMethod;
    use crate::services::Severity;
    use crate::testing::{json_response, sample_user, test_context};
    use serde_json::json;

    fn login_view(ctx: &Arc<AppContext>, params: RouteParams) -> LoginView {
        let mut view = LoginView::new(ctx.clone(), Outlet::new(), params);
        view.attach();
        view
    }

    async fn fill(view: &mut LoginView, email: &str, password: &str) -> ViewAction {
        view.handle(UiEvent::input("login-email", email)).await.unwrap();
        view.handle(UiEvent::input("login-password", password)).await.unwrap();
        view.handle(UiEvent::submit("login-form")).await.unwrap()
    }

    #[tokio::test]
    async fn test_successful_login_goes_to_return_url() {
        let (ctx, transport, _) = test_context();
        transport.push(
            HttpMethod::Post,
            "/auth/login",
            json_response(
                200,
                json!({
                    "success": true,
                    "access_token": "a1",
                    "refresh_token": "r1",
                    "user": sample_user(),
                }),
            ),
        );
        let mut params = RouteParams::new();
        params.insert("returnUrl".to_string(), "/personnel".to_string());
        let mut view = login_view(&ctx, params);

        let action = fill(&mut view, "admin@bfp.gov.ph", "secret").await;

        assert_eq!(action, ViewAction::Navigate("/personnel".to_string()));
        assert!(ctx.services.auth.is_authenticated());
        let toasts = ctx.ui.notifications().visible();
        assert_eq!(toasts[0].message, "Login successful");
        assert_eq!(toasts[0].severity, Severity::Success);
        ctx.services.auth.stop_token_refresh();
    }

    #[tokio::test]
    async fn test_rejected_login_stays_signed_out() {
        let (ctx, transport, _) = test_context();
        transport.push(
            HttpMethod::Post,
            "/auth/login",
            json_response(401, json!({"success": false, "error": "Invalid credentials"})),
        );
        let mut view = login_view(&ctx, RouteParams::new());

        let action = fill(&mut view, "admin@bfp.gov.ph", "wrong").await;

        assert_eq!(action, ViewAction::None);
        assert!(!ctx.services.auth.is_authenticated());
        assert!(view.render().find_by_class("shake").len() == 1);
        // no refresh is attempted for a failed login
        assert_eq!(transport.count(HttpMethod::Post, "/auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_never_reach_the_network() {
        let (ctx, transport, _) = test_context();
        let mut view = login_view(&ctx, RouteParams::new());

        fill(&mut view, "", "").await;
        fill(&mut view, "not-an-email", "x").await;

        assert!(transport.calls().is_empty());
        let messages: Vec<String> = ctx
            .ui
            .notifications()
            .visible()
            .into_iter()
            .map(|t| t.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Please enter both email and password",
                "Please enter a valid email address"
            ]
        );
    }

    #[test]
    fn test_remembered_email_is_prefilled() {
        let (ctx, _, _) = test_context();
        ctx.services.auth.remember_email(Some("juan@bfp.gov.ph"));
        let view = login_view(&ctx, RouteParams::new());

        let markup = view.render();
        let email = markup.find_by_id("login-email").unwrap();
        assert_eq!(email.get_attr("value"), Some("juan@bfp.gov.ph"));
        assert_eq!(
            markup.find_by_id("login-remember").unwrap().get_attr("checked"),
            Some("checked")
        );
    }
}
