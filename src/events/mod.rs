//! Application Events
//!
//! A typed publish/subscribe bus shared through the application context.
//! Services publish `<resource>:<action>` events after successful calls and
//! `error:<resource>` events on failure; the router, UI manager and views
//! react without holding references to each other.

mod bus;
mod messages;

pub use bus::{EventBus, HandlerError, HandlerId, HandlerResult, Subscription};
pub use messages::{AppEvent, EventKind, Resource};
