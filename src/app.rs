//! Application Shell
//!
//! [`AppContext`] is built once and shared by the router, every view and
//! every service. [`App`] owns the router and installs the global reactions
//! to bus events: toasts for resource successes and errors, the session
//! expiry notice, and navigation after sign-out.
//!
//! Bus handlers run synchronously inside `emit`, so reactions that need the
//! router or an await are queued as commands and drained by
//! [`App::process_commands`] after each navigation or UI event.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::api::{ApiClient, HttpTransport, ReqwestTransport, TransportError};
use crate::config::Config;
use crate::events::{AppEvent, EventBus, EventKind, Resource, Subscription};
use crate::face::Camera;
use crate::router::{Router, RouterError, RouterResult};
use crate::services::{
    AttendanceService, AuthService, FaceService, NotificationService, PersonnelService,
    ReportService, SettingsService, UserService,
};
use crate::session::TokenStore;
use crate::storage::{FileStore, KeyValueStore, StorageError};
use crate::ui::UiManager;
use crate::views::{el, Node, UiEvent, UiEventKind};

const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Router(#[from] RouterError),
}

/// One service per backend resource, plus the toast queue
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub personnel: PersonnelService,
    pub attendance: AttendanceService,
    pub face: FaceService,
    pub user: UserService,
    pub report: ReportService,
    pub settings: SettingsService,
    pub notification: NotificationService,
}

/// Everything the router, views and services share
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn KeyValueStore>,
    pub events: EventBus,
    pub api: Arc<ApiClient>,
    pub services: Services,
    pub ui: Arc<UiManager>,
    pub camera: Arc<dyn Camera>,
}

impl AppContext {
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
        camera: Arc<dyn Camera>,
    ) -> Arc<Self> {
        let events = EventBus::new();
        let tokens = TokenStore::new(Arc::clone(&store), &config.storage);
        let api = Arc::new(ApiClient::new(&config.api, transport, tokens, events.clone()));

        let ui = Arc::new(UiManager::new(
            &config.ui,
            &config.storage,
            Arc::clone(&store),
            events.clone(),
        ));
        ui.bind();

        let services = Services {
            auth: AuthService::new(
                Arc::clone(&api),
                events.clone(),
                Arc::clone(&store),
                &config.auth,
                &config.storage,
            ),
            personnel: PersonnelService::new(Arc::clone(&api), events.clone()),
            attendance: AttendanceService::new(Arc::clone(&api), events.clone()),
            face: FaceService::new(Arc::clone(&api), events.clone()),
            user: UserService::new(Arc::clone(&api), events.clone()),
            report: ReportService::new(Arc::clone(&api), events.clone()),
            settings: SettingsService::new(
                Arc::clone(&api),
                events.clone(),
                Arc::clone(&store),
                Arc::clone(&ui),
                &config.storage,
            ),
            notification: ui.notifications().clone(),
        };

        Arc::new(Self {
            config,
            store,
            events,
            api,
            services,
            ui,
            camera,
        })
    }

    /// Production wiring: JSON state file and the reqwest transport
    pub fn open(config: Config, camera: Arc<dyn Camera>) -> Result<Arc<Self>, AppError> {
        let store = Arc::new(FileStore::open(&config.storage.state_file)?);
        let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
            config.api.request_timeout_secs,
        ))?);
        tracing::debug!(base_url = %config.api.base_url, "Application context ready");
        Ok(Self::new(config, store, transport, camera))
    }
}

/// Work a bus reaction hands back to the app
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Navigate(String),
    Logout,
}

/// Router plus the global event reactions
pub struct App {
    ctx: Arc<AppContext>,
    router: Router,
    commands: mpsc::UnboundedReceiver<Command>,
    subscriptions: Vec<Subscription>,
}

impl App {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let (tx, commands) = mpsc::unbounded_channel();
        let subscriptions = install_reactions(&ctx, tx);
        Self {
            router: Router::new(Arc::clone(&ctx)),
            ctx,
            commands,
            subscriptions,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Verify any stored session, then show `fragment`
    pub async fn start(&mut self, fragment: &str) -> RouterResult<()> {
        let auth = &self.ctx.services.auth;
        let signed_in = auth.check_auth().await;
        tracing::info!(signed_in, "Starting application");
        if signed_in {
            self.ctx.ui.set_auth_state(true, auth.current_user());
        }
        self.open(fragment).await
    }

    pub async fn open(&mut self, fragment: &str) -> RouterResult<()> {
        self.router.navigate(fragment).await?;
        self.process_commands().await
    }

    pub async fn back(&mut self) -> RouterResult<()> {
        self.router.back().await?;
        self.process_commands().await
    }

    /// Route a UI event to the nav bar or the mounted view
    pub async fn dispatch(&mut self, event: UiEvent) -> RouterResult<bool> {
        let taken = match (event.kind(), event.target()) {
            (UiEventKind::Click, "btn-logout") => {
                self.ctx.services.auth.logout().await;
                true
            }
            (UiEventKind::Click, "btn-theme") => {
                let theme = self.ctx.ui.toggle_theme();
                tracing::debug!(theme = theme.as_str(), "Theme toggled");
                true
            }
            _ => self.router.dispatch(event).await?,
        };
        self.process_commands().await?;
        Ok(taken)
    }

    /// Run queued reactions until none are left
    pub async fn process_commands(&mut self) -> RouterResult<()> {
        while let Ok(command) = self.commands.try_recv() {
            tracing::debug!(command = ?command, "Processing command");
            match command {
                Command::Navigate(target) => self.router.navigate(&target).await?,
                Command::Logout => self.ctx.services.auth.logout().await,
            }
        }
        Ok(())
    }

    /// Whole page: nav bar, mounted view, toasts and the loading overlay
    pub fn render(&self) -> Node {
        let ui = &self.ctx.ui;
        let mut main = el("main").id("app-content");
        if let Some(content) = self.router.outlet().content() {
            main = main.child(content);
        }

        let mut root = el("div")
            .id("app")
            .attr("data-theme", ui.theme().as_str())
            .child(ui.render_nav())
            .child(main)
            .child(ui.render_toasts());
        if let Some(overlay) = ui.render_loading() {
            root = root.child(overlay);
        }
        root.into()
    }

    /// Tear down the mounted view and the bus reactions
    pub fn shutdown(&mut self) {
        self.router.unmount();
        self.ctx.services.auth.stop_token_refresh();
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Toast text for a successful resource event
fn success_message(kind: EventKind) -> Option<&'static str> {
    match kind {
        EventKind::PersonnelCreated => Some("Personnel created successfully"),
        EventKind::PersonnelUpdated => Some("Personnel updated successfully"),
        EventKind::PersonnelDeleted => Some("Personnel deleted successfully"),
        EventKind::AttendanceRecorded => Some("Attendance recorded successfully"),
        EventKind::FaceRegistered => Some("Face registered successfully"),
        EventKind::FaceDeleted => Some("Face data deleted successfully"),
        _ => None,
    }
}

const SUCCESS_KINDS: [EventKind; 6] = [
    EventKind::PersonnelCreated,
    EventKind::PersonnelUpdated,
    EventKind::PersonnelDeleted,
    EventKind::AttendanceRecorded,
    EventKind::FaceRegistered,
    EventKind::FaceDeleted,
];

fn install_reactions(ctx: &AppContext, tx: mpsc::UnboundedSender<Command>) -> Vec<Subscription> {
    let events = &ctx.events;
    let mut subscriptions = Vec::new();

    let notifications = ctx.services.notification.clone();
    let commands = tx.clone();
    subscriptions.push(events.on(EventKind::SessionExpired, move |_| {
        tracing::warn!("Session expired");
        notifications.warning(SESSION_EXPIRED_NOTICE);
        let _ = commands.send(Command::Logout);
        Ok(())
    }));

    let commands = tx.clone();
    subscriptions.push(events.on(EventKind::AuthLogout, move |_| {
        let _ = commands.send(Command::Navigate("/login".to_string()));
        Ok(())
    }));

    let commands = tx;
    subscriptions.push(events.on(EventKind::NavigationRequested, move |event| {
        if let AppEvent::NavigationRequested { path } = event {
            let _ = commands.send(Command::Navigate(path.clone()));
        }
        Ok(())
    }));

    for resource in Resource::ALL {
        let notifications = ctx.services.notification.clone();
        subscriptions.push(events.on(EventKind::Error(resource), move |event| {
            if let AppEvent::Error { message, .. } = event {
                notifications.error(message.clone());
            }
            Ok(())
        }));
    }

    for kind in SUCCESS_KINDS {
        let notifications = ctx.services.notification.clone();
        subscriptions.push(events.on(kind, move |event| {
            if let Some(message) = success_message(event.kind()) {
                notifications.success(message);
            }
            Ok(())
        }));
    }

    subscriptions
}
