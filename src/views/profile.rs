//! User profile view: details, profile edit, password change and avatar

use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use super::{el, input_value, notify_failure, page, Element, Listeners, Node, Outlet, UiEvent};
use super::{UiEventKind, View, ViewAction, ViewKind, ViewResult};
use crate::api::dto::User;
use crate::api::{ApiError, ApiResult};
use crate::app::AppContext;
use crate::face::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    View,
    Edit,
    Password,
}

#[derive(Debug, Default)]
struct PasswordForm {
    current: String,
    new: String,
    confirm: String,
}

pub struct ProfileView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    user: Option<User>,
    mode: Mode,
    email: String,
    name: String,
    password: PasswordForm,
    avatar_path: String,
}

impl ProfileView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        let user = ctx.services.auth.current_user();
        let mut view = Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            user: None,
            mode: Mode::View,
            email: String::new(),
            name: String::new(),
            password: PasswordForm::default(),
            avatar_path: String::new(),
        };
        view.set_user(user);
        view
    }

    fn set_user(&mut self, user: Option<User>) {
        if let Some(user) = &user {
            self.email = user.email.clone().unwrap_or_default();
            self.name = user.name.clone().unwrap_or_default();
        }
        self.user = user;
    }

    async fn save_profile(&mut self) -> ApiResult<()> {
        let email = self.email.trim().to_string();
        let name = self.name.trim().to_string();
        if email.is_empty() {
            return Err(ApiError::Validation("Email is required".to_string()));
        }

        let ui = Arc::clone(&self.ctx.ui);
        let _loading = ui.loading();
        let updated = self
            .ctx
            .services
            .user
            .update_profile(json!({ "email": email, "name": name }))
            .await?;
        self.set_user(Some(updated));
        self.mode = Mode::View;
        self.ctx.ui.notifications().success("Profile updated successfully");
        Ok(())
    }

    async fn change_password(&mut self) -> ApiResult<()> {
        if self.password.new != self.password.confirm {
            return Err(ApiError::Validation("New passwords do not match".to_string()));
        }
        let id = self
            .user
            .as_ref()
            .map(|u| u.id)
            .ok_or_else(|| ApiError::Validation("No signed-in user".to_string()))?;

        let ui = Arc::clone(&self.ctx.ui);
        let _loading = ui.loading();
        self.ctx
            .services
            .user
            .change_password(id, &self.password.current, &self.password.new)
            .await?;
        self.password = PasswordForm::default();
        self.mode = Mode::View;
        self.ctx.ui.notifications().success("Password updated successfully");
        Ok(())
    }

    async fn upload_avatar(&mut self) -> ApiResult<()> {
        let raw = self.avatar_path.trim().to_string();
        if raw.is_empty() {
            return Err(ApiError::Validation("Please choose an image".to_string()));
        }
        let path = Path::new(&raw);
        let frame = Frame::from_file(path).map_err(|e| ApiError::Validation(e.to_string()))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("avatar.jpg")
            .to_string();

        self.ctx
            .services
            .user
            .upload_avatar(&filename, &frame.mime, frame.bytes, None)
            .await?;
        self.avatar_path.clear();
        self.ctx.ui.notifications().success("Avatar updated successfully");
        Ok(())
    }

    fn details(&self, user: &User) -> Element {
        let row = |label: &str, value: &Option<String>| {
            el("div")
                .class("profile-row")
                .child(el("span").class("profile-label").text(label))
                .child(
                    el("span")
                        .class("profile-value")
                        .text(value.clone().unwrap_or_else(|| "N/A".to_string())),
                )
        };
        el("div")
            .id("profile-view")
            .child(el("h2").id("profile-name").text(user.display_name()))
            .child(row("Username", &user.username))
            .child(row("Email", &user.email))
            .child(row("Role", &user.role))
            .child(el("button").id("edit-profile-btn").class("btn btn-primary").text("Edit Profile"))
            .child(el("button").id("change-password-btn").class("btn btn-outline").text("Change Password"))
            .child(
                el("div")
                    .class("avatar-upload")
                    .child(el("input").id("avatar-path").attr("type", "file").attr("value", self.avatar_path.clone()))
                    .child(el("button").id("upload-avatar-btn").class("btn btn-outline").text("Upload Avatar")),
            )
    }

    fn edit_form(&self, user: &User) -> Element {
        el("form")
            .id("profile-form")
            .child(
                el("input")
                    .id("username")
                    .attr("value", user.username.clone().unwrap_or_default())
                    .flag("disabled", true),
            )
            .child(el("input").id("email").attr("type", "email").attr("value", self.email.clone()))
            .child(el("input").id("name").attr("value", self.name.clone()))
            .child(el("button").id("cancel-edit-btn").attr("type", "button").class("btn btn-outline").text("Cancel"))
            .child(el("button").attr("type", "submit").class("btn btn-primary").text("Save Changes"))
    }

    fn password_form(&self) -> Element {
        el("form")
            .id("password-form")
            .child(el("input").id("current-password").attr("type", "password"))
            .child(el("input").id("new-password").attr("type", "password"))
            .child(el("input").id("confirm-password").attr("type", "password"))
            .child(
                el("button")
                    .id("cancel-password-btn")
                    .attr("type", "button")
                    .class("btn btn-outline")
                    .text("Cancel"),
            )
            .child(el("button").attr("type", "submit").class("btn btn-primary").text("Update Password"))
    }
}

#[async_trait]
impl View for ProfileView {
    fn kind(&self) -> ViewKind {
        ViewKind::Profile
    }

    fn render(&self) -> Node {
        let root = page("profile-container", "User Profile");
        let Some(user) = &self.user else {
            return root
                .child(el("div").class("loading-message").text("Loading profile..."))
                .into();
        };
        let body = match self.mode {
            Mode::View => self.details(user),
            Mode::Edit => self.edit_form(user),
            Mode::Password => self.password_form(),
        };
        root.child(body).into()
    }

    fn attach(&mut self) {
        let outlet = self.outlet.clone();
        for target in [
            "edit-profile-btn",
            "change-password-btn",
            "cancel-edit-btn",
            "cancel-password-btn",
            "upload-avatar-btn",
        ] {
            self.listeners.add(&outlet, UiEventKind::Click, target);
        }
        for target in [
            "email",
            "name",
            "current-password",
            "new-password",
            "confirm-password",
            "avatar-path",
        ] {
            self.listeners.add(&outlet, UiEventKind::Input, target);
        }
        self.listeners.add(&outlet, UiEventKind::Submit, "profile-form");
        self.listeners.add(&outlet, UiEventKind::Submit, "password-form");
    }

    async fn load(&mut self) -> ViewResult<()> {
        match self.ctx.services.auth.get_user_data().await {
            Ok(user) => self.set_user(Some(user)),
            Err(e) => tracing::warn!(error = %e, "Failed to refresh profile"),
        }
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        if let Some(value) = input_value(&event) {
            let value = value.to_string();
            match event.target() {
                "email" => self.email = value,
                "name" => self.name = value,
                "current-password" => self.password.current = value,
                "new-password" => self.password.new = value,
                "confirm-password" => self.password.confirm = value,
                "avatar-path" => self.avatar_path = value,
                _ => {}
            }
            return Ok(ViewAction::None);
        }

        let result = match event.target() {
            "edit-profile-btn" => {
                self.mode = Mode::Edit;
                Ok(())
            }
            "change-password-btn" => {
                self.mode = Mode::Password;
                Ok(())
            }
            "cancel-edit-btn" => {
                let user = self.user.take();
                self.set_user(user);
                self.mode = Mode::View;
                Ok(())
            }
            "cancel-password-btn" => {
                self.password = PasswordForm::default();
                self.mode = Mode::View;
                Ok(())
            }
            "upload-avatar-btn" => self.upload_avatar().await,
            "profile-form" => self.save_profile().await,
            "password-form" => self.change_password().await,
            _ => Ok(()),
        };
        if let Err(e) = result {
            notify_failure(&self.ctx, &e);
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
    use crate::testing::{json_response, sample_user, sign_in, test_context};

    async fn loaded(ctx: &Arc<AppContext>) -> ProfileView {
        let mut view = ProfileView::new(ctx.clone(), Outlet::new());
        view.attach();
        view.load().await.unwrap();
        view
    }

    fn script_me(transport: &crate::testing::ScriptedTransport) {
        transport.always(
            HttpMethod::Get,
            "/auth/me",
            json_response(200, json!({"success": true, "user": sample_user()})),
        );
    }

    #[tokio::test]
    async fn test_profile_edit_round() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        script_me(&transport);
        let mut updated = sample_user();
        updated["name"] = json!("Chief Admin");
        transport.push(
            HttpMethod::Put,
            "/users/profile",
            json_response(200, json!({"success": true, "user": updated})),
        );

        let mut view = loaded(&ctx).await;
        view.handle(UiEvent::click("edit-profile-btn")).await.unwrap();
        assert!(view.render().find_by_id("profile-form").is_some());

        view.handle(UiEvent::input("name", "Chief Admin")).await.unwrap();
        view.handle(UiEvent::submit("profile-form")).await.unwrap();

        let body = &transport.bodies(HttpMethod::Put, "/users/profile")[0];
        assert_eq!(body["name"], "Chief Admin");
        assert_eq!(body["email"], "admin@bfp.gov.ph");

        let markup = view.render();
        let name = Node::from(markup.find_by_id("profile-name").unwrap().clone());
        assert_eq!(name.text_content(), "Chief Admin");
        assert!(!ctx.ui.is_loading());
        assert_eq!(ctx.ui.user_display_name(), "Chief Admin");
    }

    #[tokio::test]
    async fn test_password_mismatch_is_local() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        script_me(&transport);

        let mut view = loaded(&ctx).await;
        view.handle(UiEvent::click("change-password-btn")).await.unwrap();
        view.handle(UiEvent::input("current-password", "old")).await.unwrap();
        view.handle(UiEvent::input("new-password", "n3w-secret")).await.unwrap();
        view.handle(UiEvent::input("confirm-password", "typo")).await.unwrap();
        view.handle(UiEvent::submit("password-form")).await.unwrap();

        assert_eq!(transport.count(HttpMethod::Put, "/users/1/password"), 0);
        assert_eq!(
            ctx.ui.notifications().visible()[0].message,
            "New passwords do not match"
        );
    }

    #[tokio::test]
    async fn test_password_change_returns_to_details() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        script_me(&transport);
        transport.push(
            HttpMethod::Put,
            "/users/1/password",
            json_response(200, json!({"success": true})),
        );

        let mut view = loaded(&ctx).await;
        view.handle(UiEvent::click("change-password-btn")).await.unwrap();
        view.handle(UiEvent::input("current-password", "old")).await.unwrap();
        view.handle(UiEvent::input("new-password", "n3w-secret")).await.unwrap();
        view.handle(UiEvent::input("confirm-password", "n3w-secret")).await.unwrap();
        view.handle(UiEvent::submit("password-form")).await.unwrap();

        assert_eq!(transport.count(HttpMethod::Put, "/users/1/password"), 1);
        assert!(view.render().find_by_id("profile-view").is_some());
        assert!(view.password.new.is_empty());
    }
}
