//! Global Chrome
//!
//! Everything outside the routed outlet: navigation, the loading overlay,
//! the document title, the colour theme and the toast stack.

mod manager;
mod theme;

pub use manager::{LoadingGuard, NavLink, UiManager, NAV_LINKS};
pub use theme::Theme;
