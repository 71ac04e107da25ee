//! Settings service
//!
//! A nested JSON document persisted under the settings key. Keys use dot
//! notation (`faceRecognition.minConfidence`); missing intermediate objects
//! are created on update.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::Reported;
use crate::api::{ApiClient, ApiResult, RequestOptions};
use crate::config::StorageConfig;
use crate::events::{AppEvent, EventBus, Resource};
use crate::storage::{KeyValueStore, StorageError};
use crate::ui::{Theme, UiManager};

/// Settings used when nothing is stored yet, and by `reset`
pub fn default_settings() -> Value {
    json!({
        "theme": "light",
        "language": "en",
        "notifications": true,
        "attendance": {
            "autoLogout": true,
            "showRecentAttendance": true,
            "attendanceTimeFormat": "24h"
        },
        "faceRecognition": {
            "enableAutoCapture": true,
            "captureDelay": 3000,
            "minConfidence": 0.7
        },
        "dashboard": {
            "showAttendanceChart": true,
            "showPersonnelStats": true,
            "defaultDateRange": "week"
        },
        "ui": {
            "sidebarCollapsed": false,
            "tableRowsPerPage": 10,
            "animationsEnabled": true
        }
    })
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid setting key: {0:?}")]
    InvalidKey(String),

    #[error("Invalid settings format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Clone)]
pub struct SettingsService {
    api: Arc<ApiClient>,
    events: EventBus,
    store: Arc<dyn KeyValueStore>,
    ui: Arc<UiManager>,
    key: String,
    settings: Arc<Mutex<Value>>,
}

impl SettingsService {
    /// Load the stored document (or the defaults) and apply its theme
    pub fn new(
        api: Arc<ApiClient>,
        events: EventBus,
        store: Arc<dyn KeyValueStore>,
        ui: Arc<UiManager>,
        storage: &StorageConfig,
    ) -> Self {
        let stored = match store.get(&storage.settings_key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read settings");
                None
            }
        };

        let loaded = stored.and_then(|raw| match serde_json::from_str::<Value>(&raw) {
            Ok(doc) if doc.is_object() => Some(doc),
            Ok(_) | Err(_) => {
                tracing::warn!("Stored settings are not a JSON object, using defaults");
                None
            }
        });
        let needs_save = loaded.is_none();

        let service = Self {
            api,
            events,
            store,
            ui,
            key: storage.settings_key.clone(),
            settings: Arc::new(Mutex::new(loaded.unwrap_or_else(default_settings))),
        };

        if needs_save {
            if let Err(e) = service.persist() {
                tracing::error!(error = %e, "Failed to save default settings");
            }
        }
        service.apply_theme();
        service
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self) -> SettingsResult<()> {
        let raw = serde_json::to_string(&*self.lock())
            .map_err(|e| SettingsError::InvalidFormat(e.to_string()))?;
        self.store.set(&self.key, &raw)?;
        Ok(())
    }

    fn apply_theme(&self) {
        self.ui.set_theme(self.theme());
    }

    /// Copy of the whole document
    pub fn all(&self) -> Value {
        self.lock().clone()
    }

    /// Value at a dot-notation key
    pub fn get(&self, key: &str) -> Option<Value> {
        let doc = self.lock();
        let found = key
            .split('.')
            .try_fold(&*doc, |value, part| value.get(part))
            .filter(|value| !value.is_null())
            .cloned();
        found
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Typed read; `None` when absent or of the wrong shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Set a value at a dot-notation key and persist the document
    pub fn update(&self, key: &str, value: Value) -> SettingsResult<()> {
        let result = self.try_update(key, value);
        if let Err(e) = &result {
            tracing::error!(key, error = %e, "Failed to update setting");
            self.events.emit(AppEvent::error(
                Resource::Settings,
                format!("Failed to update setting: {}", key),
            ));
        }
        result
    }

    fn try_update(&self, key: &str, value: Value) -> SettingsResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(SettingsError::InvalidKey(key.to_string()));
        }

        {
            let mut doc = self.lock();
            let Some((last, parents)) = parts.split_last() else {
                return Err(SettingsError::InvalidKey(key.to_string()));
            };
            let mut target = &mut *doc;
            for part in parents {
                let Some(object) = target.as_object_mut() else {
                    return Err(SettingsError::InvalidKey(key.to_string()));
                };
                target = object
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            let Some(object) = target.as_object_mut() else {
                return Err(SettingsError::InvalidKey(key.to_string()));
            };
            object.insert(last.to_string(), value);
        }

        self.persist()?;
        if key == "theme" {
            self.apply_theme();
        }

        tracing::debug!(key, "Setting updated");
        self.events.emit(AppEvent::SettingsUpdated {
            key: Some(key.to_string()),
        });
        Ok(())
    }

    /// Restore the defaults
    pub fn reset(&self) -> SettingsResult<()> {
        *self.lock() = default_settings();
        if let Err(e) = self.persist() {
            self.events
                .emit(AppEvent::error(Resource::Settings, "Failed to reset settings"));
            return Err(e);
        }
        self.apply_theme();
        self.events.emit(AppEvent::SettingsReset);
        Ok(())
    }

    /// Pretty-printed JSON of the document
    pub fn export(&self) -> SettingsResult<String> {
        serde_json::to_string_pretty(&*self.lock())
            .map_err(|e| SettingsError::InvalidFormat(e.to_string()))
    }

    /// Replace the document with an exported one; only JSON objects are accepted
    pub fn import(&self, raw: &str) -> SettingsResult<()> {
        let parsed = match serde_json::from_str::<Value>(raw) {
            Ok(doc) if doc.is_object() => Ok(doc),
            Ok(_) => Err(SettingsError::InvalidFormat(
                "settings must be a JSON object".to_string(),
            )),
            Err(e) => Err(SettingsError::InvalidFormat(e.to_string())),
        };

        let result = parsed.and_then(|doc| {
            *self.lock() = doc;
            self.persist()
        });
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to import settings");
            self.events.emit(AppEvent::error(
                Resource::Settings,
                "Failed to import settings: Invalid format",
            ));
            return Err(e);
        }

        self.apply_theme();
        self.events.emit(AppEvent::SettingsImported);
        Ok(())
    }

    pub fn theme(&self) -> Theme {
        self.get("theme")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> SettingsResult<()> {
        self.update("theme", json!(theme.as_str()))
    }

    /// Pull the server copy and merge its top-level keys into the local document
    pub async fn fetch_remote(&self) -> ApiResult<Value> {
        let response = self
            .api
            .request("/settings", RequestOptions::get())
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Settings, "Failed to load settings")?;

        let remote = ["settings", "data"]
            .iter()
            .find_map(|field| response.get(field).filter(|v| v.is_object()))
            .cloned()
            .unwrap_or_else(|| response.clone());

        if let Value::Object(entries) = remote {
            {
                let mut doc = self.lock();
                if let Some(local) = doc.as_object_mut() {
                    for (key, value) in entries {
                        local.insert(key, value);
                    }
                }
            }
            self.persist()?;
            self.apply_theme();
            self.events.emit(AppEvent::SettingsUpdated { key: None });
        }
        Ok(self.all())
    }

    /// Push the local document to the server
    pub async fn save_remote(&self) -> ApiResult<Value> {
        self.api
            .request("/settings", RequestOptions::put(self.all()))
            .await
            .map(|p| p.into_json())
            .reported(&self.events, Resource::Settings, "Failed to save settings")
    }
}

impl From<SettingsError> for crate::api::ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Storage(e) => e.into(),
            other => crate::api::ApiError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpMethod;
    use crate::events::EventKind;
    use crate::testing::{json_response, sign_in, test_context};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults_are_saved_on_first_load() {
        let (ctx, _, _) = test_context();
        let settings = &ctx.services.settings;

        assert_eq!(settings.get("faceRecognition.minConfidence"), Some(json!(0.7)));
        assert_eq!(settings.get("ui.tableRowsPerPage"), Some(json!(10)));
        assert!(ctx.store.get("bfp_settings").unwrap().is_some());
    }

    #[test]
    fn test_update_creates_nested_objects() {
        let (ctx, _, _) = test_context();
        let settings = &ctx.services.settings;

        settings.update("reports.lastFormat", json!("pdf")).unwrap();
        assert_eq!(settings.get_as::<String>("reports.lastFormat").as_deref(), Some("pdf"));
        assert_eq!(settings.get_or("reports.missing", json!(1)), json!(1));

        let stored: Value =
            serde_json::from_str(&ctx.store.get("bfp_settings").unwrap().unwrap()).unwrap();
        assert_eq!(stored["reports"]["lastFormat"], "pdf");
    }

    #[test]
    fn test_update_through_scalar_is_rejected() {
        let (ctx, _, _) = test_context();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&errors);
        ctx.events.on(EventKind::Error(Resource::Settings), move |_| {
            e.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = ctx
            .services
            .settings
            .update("language.code", json!("fil"))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidKey(_)));
        assert!(ctx.services.settings.update("", json!(1)).is_err());
        assert_eq!(errors.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_theme_setting_drives_ui() {
        let (ctx, _, _) = test_context();
        ctx.services.settings.set_theme(Theme::Dark).unwrap();
        assert_eq!(ctx.ui.theme(), Theme::Dark);

        ctx.services.settings.reset().unwrap();
        assert_eq!(ctx.ui.theme(), Theme::Light);
    }

    #[test]
    fn test_import_accepts_only_objects() {
        let (ctx, _, _) = test_context();
        let settings = &ctx.services.settings;
        let imported = Arc::new(AtomicUsize::new(0));
        let i = Arc::clone(&imported);
        ctx.events.on(EventKind::SettingsImported, move |_| {
            i.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(settings.import("[1, 2]").is_err());
        assert!(settings.import("not json").is_err());
        assert_eq!(settings.get("theme"), Some(json!("light")));

        settings.import(r#"{"theme": "dark", "language": "fil"}"#).unwrap();
        assert_eq!(settings.get("language"), Some(json!("fil")));
        assert_eq!(ctx.ui.theme(), Theme::Dark);
        assert_eq!(imported.load(Ordering::SeqCst), 1);

        let exported = settings.export().unwrap();
        assert!(exported.contains("\"language\": \"fil\""));
    }

    #[tokio::test]
    async fn test_fetch_remote_merges_server_document() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(
            HttpMethod::Get,
            "/settings",
            json_response(200, json!({"success": true, "settings": {"language": "fil"}})),
        );

        let doc = ctx.services.settings.fetch_remote().await.unwrap();
        assert_eq!(doc["language"], "fil");
        assert_eq!(doc["theme"], "light");
    }
}
