//! Settings view
//!
//! Edits are held as a draft until saved; each changed key is written
//! through the settings service, which persists and applies the theme.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{el, input_value, notify_failure, page, Element, Listeners, Node, Outlet, UiEvent};
use super::{UiEventKind, View, ViewAction, ViewKind, ViewResult};
use crate::api::ApiError;
use crate::app::AppContext;

#[derive(Debug, Clone, Copy)]
enum FieldType {
    Choice(&'static [&'static str]),
    Toggle,
    /// Inclusive bounds
    Number(f64, f64),
    Integer(u64, u64),
}

struct Field {
    id: &'static str,
    key: &'static str,
    label: &'static str,
    ty: FieldType,
}

static FIELDS: [Field; 7] = [
    Field { id: "setting-theme", key: "theme", label: "Theme", ty: FieldType::Choice(&["light", "dark"]) },
    Field { id: "setting-language", key: "language", label: "Language", ty: FieldType::Choice(&["en", "fil"]) },
    Field { id: "setting-notifications", key: "notifications", label: "Notifications", ty: FieldType::Toggle },
    Field {
        id: "setting-time-format",
        key: "attendance.attendanceTimeFormat",
        label: "Time Format",
        ty: FieldType::Choice(&["12h", "24h"]),
    },
    Field {
        id: "setting-min-confidence",
        key: "faceRecognition.minConfidence",
        label: "Minimum Confidence",
        ty: FieldType::Number(0.1, 0.9),
    },
    Field {
        id: "setting-default-range",
        key: "dashboard.defaultDateRange",
        label: "Default Dashboard Range",
        ty: FieldType::Choice(&["day", "week", "month"]),
    },
    Field {
        id: "setting-rows-per-page",
        key: "ui.tableRowsPerPage",
        label: "Rows Per Page",
        ty: FieldType::Integer(1, 100),
    },
];

fn parse_field(field: &Field, raw: &str) -> Result<Value, String> {
    let raw = raw.trim();
    match field.ty {
        FieldType::Choice(options) => options
            .iter()
            .find(|o| **o == raw)
            .map(|o| json!(o))
            .ok_or_else(|| format!("{} must be one of: {}", field.label, options.join(", "))),
        FieldType::Toggle => match raw {
            "true" | "on" | "1" => Ok(json!(true)),
            "false" | "off" | "0" => Ok(json!(false)),
            _ => Err(format!("{} must be on or off", field.label)),
        },
        FieldType::Number(min, max) => raw
            .parse::<f64>()
            .ok()
            .filter(|n| (min..=max).contains(n))
            .map(|n| json!(n))
            .ok_or_else(|| format!("{} must be between {} and {}", field.label, min, max)),
        FieldType::Integer(min, max) => raw
            .parse::<u64>()
            .ok()
            .filter(|n| (min..=max).contains(n))
            .map(|n| json!(n))
            .ok_or_else(|| format!("{} must be between {} and {}", field.label, min, max)),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub struct SettingsView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    draft: BTreeMap<&'static str, Value>,
    import_path: String,
    confirm_reset: bool,
    exported: Option<PathBuf>,
}

impl SettingsView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            draft: BTreeMap::new(),
            import_path: String::new(),
            confirm_reset: false,
            exported: None,
        }
    }

    fn current(&self, field: &Field) -> Value {
        self.draft
            .get(field.key)
            .cloned()
            .or_else(|| self.ctx.services.settings.get(field.key))
            .unwrap_or(Value::Null)
    }

    fn save(&mut self) {
        let settings = &self.ctx.services.settings;
        let mut failed = false;
        for (key, value) in std::mem::take(&mut self.draft) {
            if settings.update(key, value).is_err() {
                failed = true;
            }
        }
        if !failed {
            self.ctx.ui.notifications().success("Settings saved successfully");
        }
    }

    fn export(&mut self) {
        let result = self.ctx.services.settings.export().map_err(|e| e.to_string()).and_then(|json| {
            let dir = PathBuf::from(&self.ctx.config.storage.download_dir);
            let path = dir.join(format!(
                "rollcall_settings_{}.json",
                chrono::Local::now().format("%Y-%m-%d")
            ));
            std::fs::create_dir_all(&dir)
                .and_then(|_| std::fs::write(&path, json))
                .map(|_| path)
                .map_err(|e| e.to_string())
        });
        match result {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Settings exported");
                self.ctx
                    .ui
                    .notifications()
                    .success(format!("Settings exported to {}", path.display()));
                self.exported = Some(path);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to export settings");
                self.ctx
                    .ui
                    .notifications()
                    .error(format!("Failed to export settings: {}", e));
            }
        }
    }

    fn import(&mut self) {
        let path = self.import_path.trim();
        if path.is_empty() {
            notify_failure(
                &self.ctx,
                &ApiError::Validation("Please choose a settings file".to_string()),
            );
            return;
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path, error = %e, "Failed to read settings file");
                self.ctx
                    .ui
                    .notifications()
                    .error(format!("Failed to read settings file: {}", e));
                return;
            }
        };
        if self.ctx.services.settings.import(&raw).is_ok() {
            self.draft.clear();
            self.ctx.ui.notifications().success("Settings imported successfully");
        }
    }

    fn field_row(&self, field: &Field) -> Element {
        let value = self.current(field);
        let control = match field.ty {
            FieldType::Choice(options) => {
                let current = display(&value);
                el("select").id(field.id).class("form-control").children(options.iter().map(|o| {
                    el("option")
                        .attr("value", *o)
                        .flag("selected", *o == current)
                        .text(*o)
                }))
            }
            FieldType::Toggle => el("input")
                .id(field.id)
                .attr("type", "checkbox")
                .flag("checked", value.as_bool().unwrap_or(false)),
            FieldType::Number(min, max) => el("input")
                .id(field.id)
                .attr("type", "range")
                .attr("min", min.to_string())
                .attr("max", max.to_string())
                .attr("step", "0.05")
                .attr("value", display(&value)),
            FieldType::Integer(min, max) => el("input")
                .id(field.id)
                .attr("type", "number")
                .attr("min", min.to_string())
                .attr("max", max.to_string())
                .attr("value", display(&value)),
        };

        let mut row = el("div")
            .class("form-group")
            .child(el("label").attr("for", field.id).text(field.label))
            .child(control);
        if self.draft.contains_key(field.key) {
            row = row.class("modified");
        }
        row
    }
}

#[async_trait]
impl View for SettingsView {
    fn kind(&self) -> ViewKind {
        ViewKind::Settings
    }

    fn render(&self) -> Node {
        let mut root = page("settings-container", "Settings")
            .child(
                el("div")
                    .class("settings-card")
                    .children(FIELDS.iter().map(|f| self.field_row(f)))
                    .child(
                        el("button")
                            .id("save-settings")
                            .class("btn btn-primary")
                            .flag("disabled", self.draft.is_empty())
                            .text("Save Settings"),
                    ),
            )
            .child(
                el("div")
                    .class("settings-card")
                    .child(el("h2").text("Backup"))
                    .child(el("button").id("export-settings").class("btn btn-outline").text("Export"))
                    .child(
                        el("input")
                            .id("import-path")
                            .attr("type", "file")
                            .attr("value", self.import_path.clone()),
                    )
                    .child(el("button").id("import-settings").class("btn btn-outline").text("Import"))
                    .child(el("button").id("sync-settings").class("btn btn-outline").text("Load from Server"))
                    .child(el("button").id("push-settings").class("btn btn-outline").text("Save to Server")),
            )
            .child(
                el("div")
                    .class("settings-card danger-zone")
                    .child(el("button").id("reset-settings").class("btn btn-outline btn-danger").text("Reset to Defaults")),
            );

        if self.confirm_reset {
            root = root.child(
                el("div")
                    .id("confirm-reset")
                    .class("modal active")
                    .child(el("p").text("Are you sure you want to reset all settings to their defaults?"))
                    .child(el("button").id("confirm-reset-cancel").class("btn btn-outline").text("Cancel"))
                    .child(el("button").id("confirm-reset-ok").class("btn btn-danger").text("Reset")),
            );
        }
        if let Some(path) = &self.exported {
            root = root.child(el("p").id("export-path").class("hint").text(path.display().to_string()));
        }
        root.into()
    }

    fn attach(&mut self) {
        let outlet = self.outlet.clone();
        for field in &FIELDS {
            self.listeners.add(&outlet, UiEventKind::Input, field.id);
        }
        self.listeners.add(&outlet, UiEventKind::Input, "import-path");
        for target in [
            "save-settings",
            "export-settings",
            "import-settings",
            "sync-settings",
            "push-settings",
            "reset-settings",
            "confirm-reset-ok",
            "confirm-reset-cancel",
        ] {
            self.listeners.add(&outlet, UiEventKind::Click, target);
        }
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        if let Some(value) = input_value(&event) {
            if event.target() == "import-path" {
                self.import_path = value.to_string();
            } else if let Some(field) = FIELDS.iter().find(|f| f.id == event.target()) {
                match parse_field(field, value) {
                    Ok(parsed) => {
                        self.draft.insert(field.key, parsed);
                    }
                    Err(message) => notify_failure(&self.ctx, &ApiError::Validation(message)),
                }
            }
            return Ok(ViewAction::None);
        }

        let notifications = self.ctx.ui.notifications().clone();
        match event.target() {
            "save-settings" => self.save(),
            "export-settings" => self.export(),
            "import-settings" => self.import(),
            "sync-settings" => {
                if self.ctx.services.settings.fetch_remote().await.is_ok() {
                    self.draft.clear();
                    notifications.success("Settings loaded from server");
                }
            }
            "push-settings" => {
                if self.ctx.services.settings.save_remote().await.is_ok() {
                    notifications.success("Settings saved to server");
                }
            }
            "reset-settings" => self.confirm_reset = true,
            "confirm-reset-cancel" => self.confirm_reset = false,
            "confirm-reset-ok" => {
                self.confirm_reset = false;
                if self.ctx.services.settings.reset().is_ok() {
                    self.draft.clear();
                    notifications.success("Settings reset to defaults");
                }
            }
            _ => {}
        }
        Ok(ViewAction::None)
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}
