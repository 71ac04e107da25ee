//! Persisted Client State
//!
//! Small key-value layer standing in for the browser's local storage:
//!
//! - **kv**: `KeyValueStore` trait with in-memory and JSON-file backends
//! - **error**: Error types
//!
//! Tokens, the remembered login email, the theme and the settings document
//! all live here under fixed keys (see [`crate::config::StorageConfig`]).

mod error;
mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
