//! UI manager
//!
//! Holds the chrome state shared by the router and the views. The loading
//! overlay is a counter so nested operations keep it up until the outermost
//! one finishes.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::theme::Theme;
use crate::api::dto::User;
use crate::config::{StorageConfig, UiConfig};
use crate::events::{AppEvent, EventBus, EventKind};
use crate::services::{NotificationService, Severity};
use crate::storage::KeyValueStore;
use crate::views::node::{el, Element, Node};

/// A navigation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavLink {
    pub path: &'static str,
    pub label: &'static str,
    /// Shown only when signed in; otherwise only when signed out
    pub requires_auth: bool,
}

pub const NAV_LINKS: &[NavLink] = &[
    NavLink {
        path: "/dashboard",
        label: "Dashboard",
        requires_auth: true,
    },
    NavLink {
        path: "/attendance",
        label: "Attendance",
        requires_auth: true,
    },
    NavLink {
        path: "/personnel",
        label: "Personnel",
        requires_auth: true,
    },
    NavLink {
        path: "/reports",
        label: "Reports",
        requires_auth: true,
    },
    NavLink {
        path: "/settings",
        label: "Settings",
        requires_auth: true,
    },
    NavLink {
        path: "/login",
        label: "Login",
        requires_auth: false,
    },
];

#[derive(Debug)]
struct ChromeState {
    theme: Theme,
    loading_depth: usize,
    title: String,
    active_path: Option<String>,
    authenticated: bool,
    user: Option<User>,
}

/// Global chrome shared by the router and every view
pub struct UiManager {
    app_title: String,
    theme_key: String,
    store: Arc<dyn KeyValueStore>,
    events: EventBus,
    notifications: NotificationService,
    state: Mutex<ChromeState>,
}

impl UiManager {
    pub fn new(
        ui: &UiConfig,
        storage: &StorageConfig,
        store: Arc<dyn KeyValueStore>,
        events: EventBus,
    ) -> Self {
        let saved = match store.get(&storage.theme_key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read saved theme");
                None
            }
        };
        let theme = saved
            .as_deref()
            .unwrap_or(&ui.default_theme)
            .parse()
            .unwrap_or_default();

        Self {
            app_title: ui.app_title.clone(),
            theme_key: storage.theme_key.clone(),
            store,
            events,
            notifications: NotificationService::new(ui.max_visible_toasts),
            state: Mutex::new(ChromeState {
                theme,
                loading_depth: 0,
                title: ui.app_title.clone(),
                active_path: None,
                authenticated: false,
                user: None,
            }),
        }
    }

    /// Follow sign-in, sign-out and profile changes on the bus
    pub fn bind(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.events.on(EventKind::AuthLogin, auth_handler(&weak));
        self.events.on(EventKind::AuthLogout, auth_handler(&weak));
        self.events.on(EventKind::ProfileUpdated, auth_handler(&weak));
    }

    fn lock(&self) -> MutexGuard<'_, ChromeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn app_title(&self) -> &str {
        &self.app_title
    }

    // --- theme ---

    pub fn theme(&self) -> Theme {
        self.lock().theme
    }

    /// Apply and persist a theme
    pub fn set_theme(&self, theme: Theme) {
        let changed = {
            let mut state = self.lock();
            let changed = state.theme != theme;
            state.theme = theme;
            changed
        };

        if let Err(e) = self.store.set(&self.theme_key, theme.as_str()) {
            tracing::warn!(error = %e, "Failed to persist theme");
        }
        if changed {
            tracing::debug!(theme = theme.as_str(), "Theme changed");
            self.events.emit(AppEvent::ThemeChanged {
                theme: theme.as_str().to_string(),
            });
        }
    }

    pub fn toggle_theme(&self) -> Theme {
        let next = self.theme().toggled();
        self.set_theme(next);
        next
    }

    // --- loading overlay ---

    pub fn show_loading(&self) {
        self.lock().loading_depth += 1;
    }

    pub fn hide_loading(&self) {
        let mut state = self.lock();
        state.loading_depth = state.loading_depth.saturating_sub(1);
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading_depth > 0
    }

    /// Overlay shown until the guard drops
    pub fn loading(&self) -> LoadingGuard<'_> {
        self.show_loading();
        LoadingGuard { ui: self }
    }

    // --- title and navigation ---

    /// Set the document title to `<title> | <app title>`
    pub fn set_title(&self, title: &str) {
        let full = if title.is_empty() {
            self.app_title.clone()
        } else {
            format!("{} | {}", title, self.app_title)
        };
        self.lock().title = full;
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn set_active_nav(&self, path: &str) {
        self.lock().active_path = Some(path.to_string());
    }

    /// The nav link covering the current path, longest prefix first
    pub fn active_nav(&self) -> Option<&'static NavLink> {
        let state = self.lock();
        let path = state.active_path.as_deref()?;
        NAV_LINKS
            .iter()
            .filter(|link| {
                path == link.path
                    || path
                        .strip_prefix(link.path)
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|link| link.path.len())
    }

    pub fn set_auth_state(&self, authenticated: bool, user: Option<User>) {
        let mut state = self.lock();
        state.authenticated = authenticated;
        state.user = user;
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }

    /// Links visible for the current sign-in state
    pub fn nav_links(&self) -> Vec<&'static NavLink> {
        let authenticated = self.is_authenticated();
        NAV_LINKS
            .iter()
            .filter(|link| link.requires_auth == authenticated)
            .collect()
    }

    pub fn user_display_name(&self) -> String {
        self.lock()
            .user
            .as_ref()
            .map(|user| user.display_name().to_string())
            .unwrap_or_else(|| "User".to_string())
    }

    // --- notifications ---

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        self.notifications.show(message, severity);
    }

    // --- rendering ---

    pub fn render_nav(&self) -> Node {
        let active = self.active_nav().map(|link| link.path);
        let links = self.nav_links().into_iter().map(|link| {
            let mut anchor = el("a")
                .class("nav-link")
                .attr("href", format!("#{}", link.path))
                .text(link.label);
            if Some(link.path) == active {
                anchor = anchor.class("active");
            }
            el("li").child(anchor)
        });

        let mut nav = el("nav")
            .id("main-nav")
            .attr("data-theme", self.theme().as_str())
            .child(el("ul").children(links));

        if self.is_authenticated() {
            nav = nav.child(
                el("div")
                    .class("user-menu")
                    .child(el("span").id("user-name").text(self.user_display_name()))
                    .child(el("button").id("btn-logout").text("Logout")),
            );
        }
        nav.child(el("button").id("btn-theme").text(match self.theme() {
            Theme::Light => "Dark mode",
            Theme::Dark => "Light mode",
        }))
        .into()
    }

    pub fn render_toasts(&self) -> Node {
        let toasts = self.notifications.visible().into_iter().map(|toast| {
            let mut item = el("div")
                .class("toast")
                .class(toast.severity.as_str())
                .attr("data-id", toast.id.0.to_string())
                .child(el("span").class("toast-message").text(toast.message));
            if toast.dismissable {
                item = item.child(el("button").class("toast-close").text("×"));
            }
            item
        });
        el("div").id("toast-container").children(toasts).into()
    }

    pub fn render_loading(&self) -> Option<Element> {
        self.is_loading()
            .then(|| el("div").id("loading-overlay").class("spinner"))
    }
}

/// Hides the loading overlay on drop
pub struct LoadingGuard<'a> {
    ui: &'a UiManager,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.ui.hide_loading();
    }
}

fn auth_handler(
    weak: &Weak<UiManager>,
) -> impl Fn(&AppEvent) -> crate::events::HandlerResult + Send + Sync + 'static {
    let weak = weak.clone();
    move |event| {
        let Some(ui) = weak.upgrade() else {
            return Ok(());
        };
        match event {
            AppEvent::AuthLogin { user } | AppEvent::ProfileUpdated { user } => {
                ui.set_auth_state(true, Some(user.clone()));
            }
            AppEvent::AuthLogout => ui.set_auth_state(false, None),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> (Arc<UiManager>, Arc<MemoryStore>, EventBus) {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new();
        let ui = Arc::new(UiManager::new(
            &UiConfig::default(),
            &StorageConfig::default(),
            store.clone(),
            events.clone(),
        ));
        ui.bind();
        (ui, store, events)
    }

    fn user(name: Option<&str>, username: &str) -> User {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "username": username,
            "name": name,
        }))
        .unwrap()
    }

    #[test]
    fn test_loading_is_nest_safe() {
        let (ui, _, _) = manager();
        {
            let _outer = ui.loading();
            {
                let _inner = ui.loading();
                assert!(ui.is_loading());
            }
            assert!(ui.is_loading());
        }
        assert!(!ui.is_loading());

        ui.hide_loading();
        ui.show_loading();
        assert!(ui.is_loading());
    }

    #[test]
    fn test_title_format() {
        let (ui, _, _) = manager();
        ui.set_title("Dashboard");
        assert_eq!(ui.title(), "Dashboard | BFP Sorsogon Attendance");
    }

    #[test]
    fn test_theme_is_persisted_and_announced() {
        let (ui, store, events) = manager();
        let changes = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&changes);
        events.on(EventKind::ThemeChanged, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(ui.theme(), Theme::Light);
        assert_eq!(ui.toggle_theme(), Theme::Dark);
        assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));

        // same theme again is not a change
        ui.set_theme(Theme::Dark);
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        let reloaded = UiManager::new(
            &UiConfig::default(),
            &StorageConfig::default(),
            store,
            EventBus::new(),
        );
        assert_eq!(reloaded.theme(), Theme::Dark);
    }

    #[test]
    fn test_nav_follows_auth_events() {
        let (ui, _, events) = manager();
        let labels = |ui: &UiManager| -> Vec<&str> { ui.nav_links().iter().map(|l| l.label).collect() };
        assert_eq!(labels(&ui), vec!["Login"]);

        events.emit(AppEvent::AuthLogin {
            user: user(None, "jdelacruz"),
        });
        assert_eq!(
            labels(&ui),
            vec!["Dashboard", "Attendance", "Personnel", "Reports", "Settings"]
        );
        assert_eq!(ui.user_display_name(), "jdelacruz");

        events.emit(AppEvent::AuthLogout);
        assert_eq!(labels(&ui), vec!["Login"]);
        assert_eq!(ui.user_display_name(), "User");
    }

    #[test]
    fn test_active_nav_matches_prefix() {
        let (ui, _, _) = manager();
        ui.set_active_nav("/attendance/records");
        assert_eq!(ui.active_nav().map(|l| l.path), Some("/attendance"));

        ui.set_active_nav("/personnel/edit");
        assert_eq!(ui.active_nav().map(|l| l.path), Some("/personnel"));

        ui.set_active_nav("/profile");
        assert!(ui.active_nav().is_none());
    }

    #[test]
    fn test_render_nav_marks_active_link() {
        let (ui, _, _) = manager();
        ui.set_auth_state(true, Some(user(Some("Juan Dela Cruz"), "juan")));
        ui.set_active_nav("/reports");

        let nav = ui.render_nav();
        let active = nav.find_by_class("active");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].get_attr("href"), Some("#/reports"));
        assert_eq!(
            nav.find_by_id("user-name").map(|e| Node::from(e.clone()).text_content()),
            Some("Juan Dela Cruz".to_string())
        );
    }
}
