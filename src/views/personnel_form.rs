//! Add / edit personnel form
//!
//! Edit mode is reached with `?id=<n>`. After a successful save an optional
//! photo file is uploaded; in edit mode a face can be registered from a
//! single camera frame.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::{el, input_value, notify_failure, page, Element, Listeners, Node, Outlet};
use super::{UiEvent, UiEventKind, View, ViewAction, ViewError, ViewKind, ViewResult};
use crate::api::dto::{Personnel, PersonnelDraft};
use crate::api::{ApiError, ApiResult, ProgressCallback};
use crate::app::AppContext;
use crate::face::Frame;
use crate::router::RouteParams;

const FIELDS: [(&str, &str); 5] = [
    ("pf-name", "Full Name"),
    ("pf-id-number", "ID Number"),
    ("pf-rank", "Rank"),
    ("pf-position", "Position"),
    ("pf-station", "Station"),
];

#[derive(Debug, Default)]
struct Form {
    name: String,
    id_number: String,
    rank: String,
    position: String,
    station: String,
    photo: String,
}

impl Form {
    fn from_personnel(person: &Personnel) -> Self {
        Self {
            name: person.name.clone(),
            id_number: person.id_number.clone().unwrap_or_default(),
            rank: person.rank.clone().unwrap_or_default(),
            position: person.position.clone().unwrap_or_default(),
            station: person.station.clone().unwrap_or_default(),
            photo: String::new(),
        }
    }

    fn field(&self, id: &str) -> &str {
        match id {
            "pf-name" => &self.name,
            "pf-id-number" => &self.id_number,
            "pf-rank" => &self.rank,
            "pf-position" => &self.position,
            "pf-station" => &self.station,
            _ => &self.photo,
        }
    }

    fn field_mut(&mut self, id: &str) -> Option<&mut String> {
        match id {
            "pf-name" => Some(&mut self.name),
            "pf-id-number" => Some(&mut self.id_number),
            "pf-rank" => Some(&mut self.rank),
            "pf-position" => Some(&mut self.position),
            "pf-station" => Some(&mut self.station),
            "pf-photo" => Some(&mut self.photo),
            _ => None,
        }
    }

    fn draft(&self) -> ApiResult<PersonnelDraft> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("Name is required".to_string()));
        }
        let opt = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        Ok(PersonnelDraft {
            name: name.to_string(),
            rank: opt(&self.rank),
            position: opt(&self.position),
            id_number: opt(&self.id_number),
            station: opt(&self.station),
        })
    }
}

pub struct PersonnelFormView {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    listeners: Listeners,
    id: Option<u64>,
    form: Form,
    loading: bool,
    saving: bool,
    load_error: Option<String>,
    progress: Arc<AtomicU8>,
    face_registered: bool,
}

impl PersonnelFormView {
    pub fn add(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        Self {
            ctx,
            outlet,
            listeners: Listeners::new(),
            id: None,
            form: Form::default(),
            loading: false,
            saving: false,
            load_error: None,
            progress: Arc::new(AtomicU8::new(0)),
            face_registered: false,
        }
    }

    pub fn edit(ctx: Arc<AppContext>, outlet: Outlet, params: &RouteParams) -> ViewResult<Self> {
        let id = params
            .get("id")
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| ViewError::InvalidParam("id".to_string()))?;
        let mut view = Self::add(ctx, outlet);
        view.id = Some(id);
        view.loading = true;
        Ok(view)
    }

    fn progress_callback(&self) -> ProgressCallback {
        let progress = Arc::clone(&self.progress);
        Arc::new(move |p| progress.store(p, Ordering::SeqCst))
    }

    async fn save(&mut self) -> ApiResult<Personnel> {
        let draft = self.form.draft()?;
        let personnel = &self.ctx.services.personnel;
        let saved = match self.id {
            Some(id) => personnel.update(id, &draft).await?,
            None => personnel.create(&draft).await?,
        };

        let photo = self.form.photo.trim();
        if !photo.is_empty() {
            let path = PathBuf::from(photo);
            let frame = tokio::task::spawn_blocking(move || Frame::from_file(&path))
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read photo: {}", e)))?
                .map_err(|e| ApiError::Validation(format!("Failed to read photo: {}", e)))?;
            let filename = std::path::Path::new(photo)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("photo.jpg")
                .to_string();
            personnel
                .upload_photo(saved.id, &filename, &frame.mime, frame.bytes, Some(self.progress_callback()))
                .await?;
        }
        Ok(saved)
    }

    async fn register_face(&mut self, id: u64) -> ViewResult<()> {
        let camera = &self.ctx.camera;
        let stream = camera.open().await?;
        let frame = camera.capture(&stream).await;
        stream.stop();

        let frame = frame?;
        self.ctx
            .services
            .face
            .register(id, &frame, Some(self.progress_callback()))
            .await?;
        self.face_registered = true;
        Ok(())
    }

    fn field(&self, id: &str, label: &str) -> Element {
        el("div")
            .class("form-group")
            .child(el("label").attr("for", id).text(label))
            .child(
                el("input")
                    .id(id)
                    .class("form-control")
                    .attr("value", self.form.field(id).to_string())
                    .flag("required", id == "pf-name"),
            )
    }
}

#[async_trait]
impl View for PersonnelFormView {
    fn kind(&self) -> ViewKind {
        if self.id.is_some() {
            ViewKind::PersonnelEdit
        } else {
            ViewKind::PersonnelAdd
        }
    }

    fn render(&self) -> Node {
        let title = if self.id.is_some() { "Edit Personnel" } else { "Add Personnel" };
        let root = page("personnel-form-container", title);

        if self.loading {
            return root.child(el("div").class("loading-message").text("Loading personnel...")).into();
        }
        if let Some(error) = &self.load_error {
            return root
                .child(el("div").class("error-message").text(error.clone()))
                .child(el("button").id("cancel-btn").class("btn btn-outline").text("Back to list"))
                .into();
        }

        let mut form = el("form")
            .id("personnel-form")
            .children(FIELDS.iter().map(|(id, label)| self.field(id, label)))
            .child(
                el("div")
                    .class("form-group")
                    .child(el("label").attr("for", "pf-photo").text("Photo"))
                    .child(el("input").id("pf-photo").attr("type", "file").attr("value", self.form.photo.clone())),
            );

        let progress = self.progress.load(Ordering::SeqCst);
        if progress > 0 {
            form = form.child(
                el("div")
                    .id("upload-progress")
                    .class("progress")
                    .attr("data-value", progress.to_string())
                    .text(format!("{}%", progress)),
            );
        }

        form = form.child(
            el("div")
                .class("form-actions")
                .child(el("button").id("cancel-btn").class("btn btn-outline").text("Cancel"))
                .child(
                    el("button")
                        .id("save-btn")
                        .attr("type", "submit")
                        .class("btn btn-primary")
                        .flag("disabled", self.saving)
                        .text(if self.saving { "Saving..." } else { "Save" }),
                ),
        );

        let mut root = root.child(form);
        if self.id.is_some() {
            let mut face = el("div")
                .class("face-registration")
                .child(el("h2").text("Face Registration"))
                .child(el("button").id("register-face-btn").class("btn btn-outline").text("Capture and Register Face"));
            if self.face_registered {
                face = face.child(el("p").id("face-registered").class("status-success").text("Face registered"));
            }
            root = root.child(face);
        }
        root.into()
    }

    fn attach(&mut self) {
        let outlet = self.outlet.clone();
        for (id, _) in FIELDS {
            self.listeners.add(&outlet, UiEventKind::Input, id);
        }
        self.listeners.add(&outlet, UiEventKind::Input, "pf-photo");
        self.listeners.add(&outlet, UiEventKind::Submit, "personnel-form");
        self.listeners.add(&outlet, UiEventKind::Click, "cancel-btn");
        if self.id.is_some() {
            self.listeners.add(&outlet, UiEventKind::Click, "register-face-btn");
        }
    }

    async fn load(&mut self) -> ViewResult<()> {
        let Some(id) = self.id else {
            return Ok(());
        };
        match self.ctx.services.personnel.get(id).await {
            Ok(person) => self.form = Form::from_personnel(&person),
            Err(e) => {
                tracing::warn!(personnel_id = id, error = %e, "Failed to load personnel");
                self.load_error = Some("Failed to load personnel".to_string());
            }
        }
        self.loading = false;
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        match event.kind() {
            UiEventKind::Input => {
                let value = input_value(&event).unwrap_or_default().to_string();
                if let Some(field) = self.form.field_mut(event.target()) {
                    *field = value;
                }
                Ok(ViewAction::None)
            }
            UiEventKind::Submit => {
                if self.saving {
                    return Ok(ViewAction::None);
                }
                self.saving = true;
                self.progress.store(0, Ordering::SeqCst);
                let result = self.save().await;
                self.saving = false;
                match result {
                    Ok(saved) => {
                        tracing::info!(personnel_id = saved.id, "Personnel saved");
                        Ok(ViewAction::Navigate("/personnel".to_string()))
                    }
                    Err(e) => {
                        notify_failure(&self.ctx, &e);
                        Ok(ViewAction::None)
                    }
                }
            }
            UiEventKind::Click => match (event.target(), self.id) {
                ("cancel-btn", _) => Ok(ViewAction::Navigate("/personnel".to_string())),
                ("register-face-btn", Some(id)) => {
                    self.progress.store(0, Ordering::SeqCst);
                    if let Err(e) = self.register_face(id).await {
                        tracing::warn!(personnel_id = id, error = %e, "Face registration failed");
                        if let ViewError::Camera(camera) = &e {
                            self.ctx.ui.notifications().error(camera.to_string());
                        }
                    }
                    Ok(ViewAction::None)
                }
                _ => Ok(ViewAction::None),
            },
        }
    }

    fn destroy(&mut self) {
        self.listeners.release(&self.outlet);
        self.outlet.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FormPart, HttpMethod};
    use crate::testing::{json_response, sign_in, test_context};
    use serde_json::json;

    fn person() -> serde_json::Value {
        json!({"id": 4, "name": "Juan Dela Cruz", "rank": "FO1", "station": "Central"})
    }

    #[tokio::test]
    async fn test_add_validates_before_network() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        let outlet = Outlet::new();
        let mut view = PersonnelFormView::add(ctx.clone(), outlet);
        view.attach();

        let action = view.handle(UiEvent::submit("personnel-form")).await.unwrap();

        assert_eq!(action, ViewAction::None);
        assert!(transport.calls().is_empty());
        assert_eq!(ctx.ui.notifications().visible()[0].message, "Name is required");
    }

    #[tokio::test]
    async fn test_add_posts_trimmed_fields_and_returns_to_list() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(HttpMethod::Post, "/personnel", json_response(201, json!({"data": person()})));

        let mut view = PersonnelFormView::add(ctx.clone(), Outlet::new());
        view.attach();
        view.handle(UiEvent::input("pf-name", " Juan Dela Cruz ")).await.unwrap();
        view.handle(UiEvent::input("pf-station", "Central")).await.unwrap();

        let action = view.handle(UiEvent::submit("personnel-form")).await.unwrap();

        assert_eq!(action, ViewAction::Navigate("/personnel".to_string()));
        let body = &transport.bodies(HttpMethod::Post, "/personnel")[0];
        assert_eq!(body["name"], "Juan Dela Cruz");
        assert_eq!(body["station"], "Central");
        assert!(body.get("rank").is_none());
    }

    #[tokio::test]
    async fn test_edit_loads_record_then_updates_with_photo() {
        let (ctx, transport, _) = test_context();
        sign_in(&ctx);
        transport.push(HttpMethod::Get, "/personnel/4", json_response(200, json!({"data": person()})));
        transport.push(HttpMethod::Put, "/personnel/4", json_response(200, json!({"data": person()})));
        transport.push(HttpMethod::Post, "/personnel/4/photo", json_response(200, json!({"success": true})));

        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("juan.png");
        std::fs::write(&photo, [0x89, b'P', b'N', b'G']).unwrap();

        let params: RouteParams = [("id".to_string(), "4".to_string())].into();
        let mut view = PersonnelFormView::edit(ctx.clone(), Outlet::new(), &params).unwrap();
        view.attach();
        view.load().await.unwrap();
        assert_eq!(view.form.rank, "FO1");

        view.handle(UiEvent::input("pf-photo", photo.to_string_lossy())).await.unwrap();
        let action = view.handle(UiEvent::submit("personnel-form")).await.unwrap();

        assert_eq!(action, ViewAction::Navigate("/personnel".to_string()));
        assert_eq!(transport.bodies(HttpMethod::Put, "/personnel/4")[0]["rank"], "FO1");
        match &transport.uploads()[0].parts[0] {
            FormPart::File { name, filename, mime, .. } => {
                assert_eq!(name, "photo");
                assert_eq!(filename, "juan.png");
                assert_eq!(mime, "image/png");
            }
            other => panic!("unexpected part {:?}", other),
        }
        assert_eq!(view.progress.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_register_face_uses_one_frame_and_stops_camera() {
        let (ctx, transport, camera) = test_context();
        sign_in(&ctx);
        transport.push(HttpMethod::Get, "/personnel/4", json_response(200, json!({"data": person()})));
        transport.push(HttpMethod::Post, "/personnel/4/face", json_response(200, json!({"success": true})));

        let params: RouteParams = [("id".to_string(), "4".to_string())].into();
        let mut view = PersonnelFormView::edit(ctx.clone(), Outlet::new(), &params).unwrap();
        view.attach();
        view.load().await.unwrap();
        view.handle(UiEvent::click("register-face-btn")).await.unwrap();

        assert_eq!(transport.count(HttpMethod::Post, "/personnel/4/face"), 1);
        assert!(view.render().find_by_id("face-registered").is_some());
        assert!(camera.streams().iter().all(|s| !s.is_live()));
    }
}
