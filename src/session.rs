//! Session Tokens
//!
//! Access and refresh tokens live in the client's key-value store under
//! configurable keys, so a restarted client resumes the previous session.

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::storage::{KeyValueStore, StorageResult};

/// Token persistence over a [`KeyValueStore`]
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    token_key: String,
    refresh_key: String,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &StorageConfig) -> Self {
        Self {
            store,
            token_key: config.token_key.clone(),
            refresh_key: config.refresh_token_key.clone(),
        }
    }

    /// Current access token; storage failures read as signed out
    pub fn access_token(&self) -> Option<String> {
        self.read(&self.token_key)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(&self.refresh_key)
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read session token");
                None
            }
        }
    }

    /// A non-empty access token means signed in
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) -> StorageResult<()> {
        self.store.set(&self.token_key, access)?;
        if let Some(refresh) = refresh {
            self.store.set(&self.refresh_key, refresh)?;
        }
        Ok(())
    }

    pub fn set_access_token(&self, access: &str) -> StorageResult<()> {
        self.store.set(&self.token_key, access)
    }

    /// Forget both tokens
    pub fn clear(&self) -> StorageResult<()> {
        self.store.remove(&self.token_key)?;
        self.store.remove(&self.refresh_key)
    }
}
