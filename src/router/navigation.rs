//! Navigation and view mounting

use futures_util::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::route::{default_routes, Location, Route, RouteTable};
use super::{RouterError, RouterResult};
use crate::app::AppContext;
use crate::config::UnknownRoutePolicy;
use crate::views::{
    ComponentFactory, ErrorBoundaryView, Outlet, UiEvent, View, ViewAction, ViewError, ViewKind,
};

const LOGIN_PATH: &str = "/login";
const DASHBOARD_PATH: &str = "/dashboard";
const NOT_FOUND_PATH: &str = "/not-found";

/// Guards may redirect at most this many times per navigation
const MAX_REDIRECTS: usize = 5;
const HISTORY_LIMIT: usize = 50;

struct Mounted {
    view: Box<dyn View>,
    location: Location,
}

enum Resolution {
    Mount(Route, Location),
    Redirect(Location),
}

/// Owns the outlet and the one mounted view
pub struct Router {
    ctx: Arc<AppContext>,
    routes: RouteTable,
    outlet: Outlet,
    current: Option<Mounted>,
    history: Vec<Location>,
}

impl Router {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self::with_routes(ctx, default_routes())
    }

    pub fn with_routes(ctx: Arc<AppContext>, routes: RouteTable) -> Self {
        Self {
            ctx,
            routes,
            outlet: Outlet::new(),
            current: None,
            history: Vec::new(),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn outlet(&self) -> &Outlet {
        &self.outlet
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.current.as_ref().map(|m| &m.location)
    }

    pub fn current_view_kind(&self) -> Option<ViewKind> {
        self.current.as_ref().map(|m| m.view.kind())
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Go to a fragment such as `#/personnel?search=cruz`
    pub async fn navigate(&mut self, target: &str) -> RouterResult<()> {
        self.go(Location::parse(target), true).await
    }

    /// Return to the previous location, if any
    pub async fn back(&mut self) -> RouterResult<()> {
        match self.history.pop() {
            Some(previous) => self.go(previous, false).await,
            None => Ok(()),
        }
    }

    /// Mount the current location again
    pub async fn reload(&mut self) -> RouterResult<()> {
        match self.current_location().cloned() {
            Some(location) => self.go(location, false).await,
            None => Ok(()),
        }
    }

    async fn go(&mut self, location: Location, push: bool) -> RouterResult<()> {
        let requested = location.target();
        let mut location = location;

        for _ in 0..=MAX_REDIRECTS {
            match self.resolve(location)? {
                Resolution::Mount(route, resolved) => {
                    self.mount(route, resolved, push).await;
                    return Ok(());
                }
                Resolution::Redirect(next) => {
                    tracing::debug!(from = %requested, to = %next.target(), "Redirecting");
                    location = next;
                }
            }
        }

        tracing::error!(target = %requested, "Redirect loop");
        Err(RouterError::RedirectLoop(requested))
    }

    fn resolve(&self, location: Location) -> RouterResult<Resolution> {
        let config = &self.ctx.config.router;
        if location.is_empty() {
            return Ok(Resolution::Redirect(Location::parse(&config.default_route)));
        }

        let Some(route) = self.routes.get(&location.path) else {
            tracing::warn!(path = %location.path, "No route matches");
            return match config.unknown_route {
                UnknownRoutePolicy::RedirectToDefault => Ok(Resolution::Redirect(
                    Location::parse(&config.default_route),
                )),
                UnknownRoutePolicy::NotFound => match self.routes.get(NOT_FOUND_PATH) {
                    Some(route) => Ok(Resolution::Mount(route.clone(), location)),
                    None => Err(RouterError::NoRoute(location.path)),
                },
            };
        };

        let authenticated = self.ctx.services.auth.is_authenticated();
        if route.requires_auth && !authenticated {
            return Ok(Resolution::Redirect(
                Location::new(LOGIN_PATH).with_param("returnUrl", location.target()),
            ));
        }
        if route.public_only && authenticated {
            return Ok(Resolution::Redirect(Location::new(DASHBOARD_PATH)));
        }

        Ok(Resolution::Mount(route.clone(), location))
    }

    async fn mount(&mut self, route: Route, location: Location, push: bool) {
        let ui = Arc::clone(&self.ctx.ui);
        let _loading = ui.loading();
        tracing::info!(path = %location.path, view = route.view.name(), "Mounting view");

        if let Some(mut previous) = self.current.take() {
            previous.view.destroy();
            if push {
                self.push_history(previous.location);
            }
        }
        self.outlet.clear();

        let view = self.construct(&route, &location);
        let view = self.start(view).await;

        ui.set_title(&route.title);
        ui.set_active_nav(&location.path);
        self.current = Some(Mounted { view, location });
    }

    fn push_history(&mut self, location: Location) {
        self.history.push(location);
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }

    fn construct(&self, route: &Route, location: &Location) -> Box<dyn View> {
        let ctx = Arc::clone(&self.ctx);
        let outlet = self.outlet.clone();
        let params = location.params.clone();
        let kind = route.view;

        let built = panic::catch_unwind(AssertUnwindSafe(move || {
            ComponentFactory::create(kind, ctx, outlet, params)
        }));
        match built {
            Ok(Ok(view)) => view,
            Ok(Err(e)) => self.boundary(kind, &e.to_string()),
            Err(payload) => self.boundary(kind, &panic_message(payload)),
        }
    }

    fn boundary(&self, kind: ViewKind, message: &str) -> Box<dyn View> {
        Box::new(ErrorBoundaryView::new(
            Arc::clone(&self.ctx),
            self.outlet.clone(),
            kind.name(),
            message,
        ))
    }

    /// attach, render, load, render; a failed load swaps in the boundary
    async fn start(&self, mut view: Box<dyn View>) -> Box<dyn View> {
        view.attach();
        self.outlet.render(view.render());

        let loaded = AssertUnwindSafe(view.load()).catch_unwind().await;
        let failure = match loaded {
            Ok(Ok(())) => None,
            // the view shows its own error state for these
            Ok(Err(e @ (ViewError::Api(_) | ViewError::Camera(_)))) => {
                tracing::warn!(view = view.kind().name(), error = %e, "View failed to load");
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload)),
        };

        if let Some(message) = failure {
            let kind = view.kind();
            view.destroy();
            let mut fallback = self.boundary(kind, &message);
            fallback.attach();
            self.outlet.render(fallback.render());
            return fallback;
        }

        self.outlet.render(view.render());
        view
    }

    /// Deliver a UI event to the mounted view; returns whether a listener took it
    pub async fn dispatch(&mut self, event: UiEvent) -> RouterResult<bool> {
        if !self.outlet.accepts(&event) {
            tracing::trace!(target = event.target(), "No listener for event");
            return Ok(false);
        }
        let Some(mounted) = self.current.as_mut() else {
            return Ok(false);
        };

        let kind = mounted.view.kind();
        let outcome = AssertUnwindSafe(mounted.view.handle(event))
            .catch_unwind()
            .await;

        let action = match outcome {
            Ok(Ok(action)) => action,
            Ok(Err(e)) => {
                tracing::warn!(view = kind.name(), error = %e, "View failed to handle event");
                // services already announced their own failures
                if !matches!(e, ViewError::Api(_)) {
                    self.ctx.ui.notifications().error(e.to_string());
                }
                ViewAction::None
            }
            Err(payload) => {
                self.replace_with_boundary(kind, &panic_message(payload));
                return Ok(true);
            }
        };

        if let Some(mounted) = &self.current {
            self.outlet.render(mounted.view.render());
        }

        match action {
            ViewAction::None => {}
            ViewAction::Navigate(target) => self.navigate(&target).await?,
            ViewAction::Back => self.back().await?,
            ViewAction::Reload => self.reload().await?,
        }
        Ok(true)
    }

    fn replace_with_boundary(&mut self, kind: ViewKind, message: &str) {
        let Some(mut mounted) = self.current.take() else {
            return;
        };
        mounted.view.destroy();
        self.outlet.clear();

        let mut fallback = self.boundary(kind, message);
        fallback.attach();
        self.outlet.render(fallback.render());
        self.current = Some(Mounted {
            view: fallback,
            location: mounted.location,
        });
    }

    /// Destroy the mounted view and leave the outlet empty
    pub fn unmount(&mut self) {
        if let Some(mut mounted) = self.current.take() {
            mounted.view.destroy();
        }
        self.outlet.clear();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
