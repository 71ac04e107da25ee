//! Hash Router
//!
//! Maps a URL fragment (`#/path?k=v`) to a registered route, applies the
//! auth and public-only guards, and owns the lifecycle of the single mounted
//! view.
//!
//! - **route**: route table, fragment parsing and the application routes
//! - **navigation**: navigation, mounting and UI event dispatch

mod route;
mod navigation;

pub use route::{default_routes, Location, Route, RouteParams, RouteTable};
pub use navigation::Router;

use thiserror::Error;

/// Errors raised by routing
#[derive(Debug, Error, PartialEq)]
pub enum RouterError {
    /// A path may be registered once
    #[error("Route already registered: {0}")]
    DuplicateRoute(String),

    /// Guards kept redirecting
    #[error("Too many redirects while resolving {0}")]
    RedirectLoop(String),

    /// Neither the path nor the not-found route is registered
    #[error("No route for {0}")]
    NoRoute(String),
}

/// Result type for routing operations
pub type RouterResult<T> = Result<T, RouterError>;
