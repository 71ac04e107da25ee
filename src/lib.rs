//! # Rollcall
//!
//! Client core of a face-recognition attendance system: the state, routing,
//! view lifecycle and capture loop behind the station's attendance screens,
//! talking to the attendance REST backend.
//!
//! ## Modules
//!
//! - [`api`]: REST client with single-flight token refresh
//! - [`events`]: typed publish/subscribe bus
//! - [`services`]: one wrapper per backend resource, plus toasts and settings
//! - [`router`]: hash routes, guards and view mounting
//! - [`views`]: declarative views over an outlet
//! - [`face`]: camera seam and the cancellable detection loop
//! - [`ui`]: theme, loading overlay, title and navigation chrome
//! - [`storage`] / [`session`]: persisted client state and tokens
//! - [`app`]: the shared context and the global event reactions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollcall::app::{App, AppContext};
//! use rollcall::config::Config;
//! use rollcall::face::NoCamera;
//! use rollcall::views::UiEvent;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = AppContext::open(Config::load_default(), Arc::new(NoCamera))?;
//!     let mut app = App::new(ctx);
//!
//!     app.start("#/dashboard").await?;
//!     app.dispatch(UiEvent::click("btn-theme")).await?;
//!
//!     println!("{}", app.context().ui.title());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod events;
pub mod face;
pub mod logging;
pub mod router;
pub mod services;
pub mod session;
pub mod storage;
pub mod ui;
pub mod views;

#[cfg(test)]
mod testing;

pub use app::{App, AppContext, AppError};
pub use config::{Config, ConfigError};
