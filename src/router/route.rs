//! Routes and locations

use std::collections::BTreeMap;
use std::fmt;

use super::{RouterError, RouterResult};
use crate::views::ViewKind;

/// Query parameters of a location, decoded
pub type RouteParams = BTreeMap<String, String>;

/// A registered route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub view: ViewKind,
    pub title: String,
    pub requires_auth: bool,
    /// Signed-in users are sent to the dashboard instead
    pub public_only: bool,
}

impl Route {
    pub fn new(path: &str, view: ViewKind, title: &str) -> Self {
        Self {
            path: path.to_string(),
            view,
            title: title.to_string(),
            requires_auth: false,
            public_only: false,
        }
    }

    pub fn protected(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn public_only(mut self) -> Self {
        self.public_only = true;
        self
    }
}

/// Registered routes by path; a path cannot be registered twice
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, route: Route) -> RouterResult<()> {
        if self.routes.contains_key(&route.path) {
            return Err(RouterError::DuplicateRoute(route.path));
        }
        tracing::trace!(path = %route.path, view = route.view.name(), "Route registered");
        self.routes.insert(route.path.clone(), route);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }
}

/// The application's routes
pub fn default_routes() -> RouteTable {
    let routes = [
        Route::new("/login", ViewKind::Login, "Login").public_only(),
        Route::new("/forgot-password", ViewKind::ForgotPassword, "Forgot Password").public_only(),
        Route::new("/dashboard", ViewKind::Dashboard, "Dashboard").protected(),
        Route::new("/attendance", ViewKind::Attendance, "Attendance").protected(),
        Route::new("/attendance/records", ViewKind::AttendanceRecords, "Attendance Records").protected(),
        Route::new("/personnel", ViewKind::Personnel, "Personnel Management").protected(),
        Route::new("/personnel/add", ViewKind::PersonnelAdd, "Add Personnel").protected(),
        Route::new("/personnel/edit", ViewKind::PersonnelEdit, "Edit Personnel").protected(),
        Route::new("/reports", ViewKind::Reports, "Reports").protected(),
        Route::new("/settings", ViewKind::Settings, "Settings").protected(),
        Route::new("/profile", ViewKind::Profile, "User Profile").protected(),
        Route::new("/not-found", ViewKind::NotFound, "Not Found"),
    ];

    let mut table = RouteTable::new();
    for route in routes {
        // paths above are distinct
        let _ = table.register(route);
    }
    table
}

/// A parsed fragment: path plus decoded query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub params: RouteParams,
}

impl Location {
    pub fn new(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            params: RouteParams::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Parse `#/path?k=v`, `/path?k=v` or `path`; an empty fragment has an empty path
    pub fn parse(fragment: &str) -> Self {
        let raw = fragment.trim().trim_start_matches('#');
        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, query),
            None => (raw, ""),
        };

        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();

        Self {
            path: normalize_path(path),
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// `/path?k=v` with encoded parameters
    pub fn target(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }

    /// `#/path?k=v`
    pub fn fragment(&self) -> String {
        format!("#{}", self.target())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fragment())
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn decode(value: &str) -> String {
    let value = value.replace('+', " ");
    urlencoding::decode(&value)
        .map(|v| v.into_owned())
        .unwrap_or(value)
}
