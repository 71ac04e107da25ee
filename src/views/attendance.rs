//! Face recognition attendance view
//!
//! Drives the capture flow: camera on, detection polling, and on a match
//! the attendance POST for the selected mode. Detection results arrive on a
//! channel consumed by a task owned by the view; that task also performs
//! the recording, so a match handed over before the view is destroyed still
//! gets recorded. Renders from that task are skipped once the view is gone.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{el, page, Element, Listeners, Node, Outlet, UiEvent, UiEventKind};
use super::{View, ViewAction, ViewKind, ViewResult};
use crate::api::dto::{AttendanceRecord, AttendanceType, FaceBox, NewAttendance, Personnel};
use crate::app::AppContext;
use crate::face::{
    spawn_detection, CameraError, CaptureState, DetectionEvent, DetectionHandle,
    DetectionSettings, FaceDetector, MediaStream,
};

const RECENT_LIMIT: u32 = 5;

#[derive(Debug, Default)]
struct AttendanceState {
    mode: AttendanceType,
    capture: CaptureState,
    camera_active: bool,
    capturing: bool,
    camera_status: Option<String>,
    face_box: Option<FaceBox>,
    recognized: Option<Personnel>,
    processing: bool,
    recorded_at: Option<String>,
    recent: Vec<AttendanceRecord>,
    recent_failed: bool,
}

struct Shared {
    ctx: Arc<AppContext>,
    outlet: Outlet,
    state: Mutex<AttendanceState>,
    destroyed: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, AttendanceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Re-render into the outlet unless the view has been destroyed
    fn refresh(&self) {
        let state = self.lock();
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }
        self.outlet.render(render_state(&state));
    }

    async fn load_recent(&self) {
        match self.ctx.services.attendance.recent(RECENT_LIMIT).await {
            Ok(records) => {
                let mut state = self.lock();
                state.recent = records;
                state.recent_failed = false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load recent attendance");
                self.lock().recent_failed = true;
            }
        }
    }

    async fn record(&self, personnel: Personnel) {
        let mode = {
            let mut state = self.lock();
            state.capture = CaptureState::Recording;
            state.mode
        };
        self.refresh();

        let attendance = NewAttendance::from_face(personnel.id, mode);
        match self.ctx.services.attendance.record(&attendance).await {
            Ok(_) => {
                {
                    let mut state = self.lock();
                    state.capture = CaptureState::Succeeded;
                    state.recorded_at = Some(format!(
                        "{}: {}",
                        mode.label(),
                        chrono::Local::now().format("%H:%M")
                    ));
                }
                self.ctx.ui.notifications().success(format!(
                    "{} {} successfully",
                    personnel.name,
                    mode.verb()
                ));
                self.load_recent().await;
            }
            Err(e) => {
                tracing::warn!(personnel_id = personnel.id, error = %e, "Attendance not recorded");
                self.lock().capture = CaptureState::Failed;
            }
        }

        self.lock().processing = false;
        self.refresh();
    }
}

/// Consume detection events until the loop's sender goes away
async fn consume(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<DetectionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            DetectionEvent::Face(face) => {
                {
                    let mut state = shared.lock();
                    if !state.capturing {
                        continue;
                    }
                    state.face_box = face.bounds;
                }
                shared.refresh();
            }
            DetectionEvent::Matched { personnel, confidence } => {
                {
                    let mut state = shared.lock();
                    if state.processing {
                        continue;
                    }
                    state.capturing = false;
                    state.capture = CaptureState::MatchFound;
                    state.recognized = Some(personnel.clone());
                    state.processing = true;
                }
                tracing::info!(personnel_id = personnel.id, confidence, "Face matched");
                shared.refresh();
                shared.record(personnel).await;
            }
        }
    }
}

pub struct AttendanceView {
    shared: Arc<Shared>,
    listeners: Listeners,
    stream: Option<MediaStream>,
    detection: Option<DetectionHandle>,
    consumer: Option<JoinHandle<()>>,
}

impl AttendanceView {
    pub fn new(ctx: Arc<AppContext>, outlet: Outlet) -> Self {
        Self {
            shared: Arc::new(Shared {
                ctx,
                outlet,
                state: Mutex::new(AttendanceState {
                    camera_status: Some("Initializing camera...".to_string()),
                    ..AttendanceState::default()
                }),
                destroyed: AtomicBool::new(false),
            }),
            listeners: Listeners::new(),
            stream: None,
            detection: None,
            consumer: None,
        }
    }

    fn ctx(&self) -> &AppContext {
        &self.shared.ctx
    }

    async fn start_camera(&mut self) {
        self.shared.lock().camera_status = Some("Initializing camera...".to_string());

        match self.ctx().camera.open().await {
            Ok(stream) => {
                tracing::info!("Camera started");
                self.stream = Some(stream);
                let mut state = self.shared.lock();
                state.camera_active = true;
                state.camera_status = None;
                if state.capture == CaptureState::Idle {
                    state.capture = CaptureState::CameraActive;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Camera initialization failed");
                self.ctx()
                    .ui
                    .notifications()
                    .error("Failed to access camera. Please check permissions.");
                let mut state = self.shared.lock();
                state.camera_active = false;
                state.camera_status = Some(match e {
                    CameraError::PermissionDenied => "Camera access denied".to_string(),
                    other => other.to_string(),
                });
            }
        }
    }

    fn stop_camera(&mut self) {
        self.stop_detection();
        if let Some(stream) = self.stream.take() {
            stream.stop();
            tracing::info!("Camera stopped");
        }
        let mut state = self.shared.lock();
        state.camera_active = false;
        state.camera_status = Some("Camera is off".to_string());
        if !state.processing {
            state.capture = CaptureState::Idle;
        }
    }

    fn start_detection(&mut self) {
        let (camera_active, processing) = {
            let state = self.shared.lock();
            (state.camera_active, state.processing)
        };
        // the loop resumes through retry once the recording settles
        if processing {
            tracing::debug!("Attendance still recording, detection not started");
            return;
        }
        let stream = match (&self.stream, camera_active) {
            (Some(stream), true) => stream.clone(),
            _ => {
                self.ctx()
                    .ui
                    .notifications()
                    .warning("Please turn on the camera first");
                return;
            }
        };

        let ctx = &self.shared.ctx;
        let detector: Arc<dyn FaceDetector> = Arc::new(ctx.services.face.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        match spawn_detection(
            Arc::clone(&ctx.camera),
            stream,
            detector,
            DetectionSettings::from(&ctx.config.face),
            tx,
        ) {
            Ok(handle) => {
                self.detection = Some(handle);
                self.consumer = Some(tokio::spawn(consume(Arc::clone(&self.shared), rx)));
                let mut state = self.shared.lock();
                state.capturing = true;
                state.capture = CaptureState::Detecting;
                state.recognized = None;
                state.recorded_at = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start face detection");
                self.ctx()
                    .ui
                    .notifications()
                    .error("Failed to start face detection");
            }
        }
    }

    fn stop_detection(&mut self) {
        if let Some(handle) = self.detection.take() {
            handle.stop();
        }
        let mut state = self.shared.lock();
        state.capturing = false;
        state.face_box = None;
        if state.capture == CaptureState::Detecting {
            state.capture = CaptureState::CameraActive;
        }
    }

    fn retry(&mut self) {
        {
            let mut state = self.shared.lock();
            if state.processing {
                return;
            }
            state.recognized = None;
            state.capture = if state.camera_active {
                CaptureState::CameraActive
            } else {
                CaptureState::Idle
            };
        }
        self.start_detection();
    }

    /// Current capture state
    pub fn capture_state(&self) -> CaptureState {
        self.shared.lock().capture
    }

    /// Whether detection is polling right now
    pub fn is_detecting(&self) -> bool {
        self.detection.as_ref().is_some_and(DetectionHandle::is_running)
    }
}

fn mode_button(mode: AttendanceType, current: AttendanceType) -> Element {
    el("button")
        .id(&format!("mode-{}", mode.as_str()))
        .class("btn")
        .class(if mode == current { "btn-primary" } else { "btn-outline" })
        .text(mode.label())
}

fn recognition_panel(state: &AttendanceState) -> Element {
    let Some(personnel) = &state.recognized else {
        return el("div").id("recognition-result").child(
            el("div")
                .class("result-placeholder")
                .child(el("p").text("No personnel recognized yet"))
                .child(el("p").class("hint").text("Start face detection to identify personnel")),
        );
    };

    let status = match state.capture {
        CaptureState::MatchFound | CaptureState::Recording => el("div")
            .id("attendance-processing")
            .class("status-processing")
            .text("Processing attendance..."),
        CaptureState::Succeeded => el("div")
            .id("attendance-success")
            .class("status-success")
            .child(el("p").text("Attendance recorded successfully"))
            .child(
                el("p")
                    .class("timestamp")
                    .text(state.recorded_at.clone().unwrap_or_default()),
            ),
        _ => el("div")
            .id("attendance-failed")
            .class("status-error")
            .text("Attendance was not recorded"),
    };

    let mut panel = el("div")
        .id("recognition-result")
        .child(
            el("div")
                .class("personnel-info")
                .child(el("h3").class("personnel-name").text(personnel.name.clone()))
                .child(
                    el("p")
                        .class("personnel-position")
                        .text(personnel.position.clone().unwrap_or_else(|| "N/A".to_string())),
                )
                .child(el("p").class("personnel-id").text(format!(
                    "ID: {}",
                    personnel.id_number.as_deref().unwrap_or("N/A")
                ))),
        )
        .child(status);

    if state.capture.awaiting_retry() {
        panel = panel.child(el("button").id("retry-button").class("btn btn-primary").text("Try Again"));
    }
    panel
}

fn recent_list(state: &AttendanceState) -> Element {
    let list = el("div").id("recent-attendance-list").class("recent-list");
    if state.recent_failed {
        return list.child(
            el("div")
                .class("error-message")
                .text("Failed to load recent attendance"),
        );
    }
    if state.recent.is_empty() {
        return list.child(
            el("div")
                .class("empty-message")
                .text("No recent attendance records"),
        );
    }
    list.children(state.recent.iter().map(|record| {
        el("div")
            .class("attendance-item")
            .child(
                el("div").class("item-name").text(
                    record
                        .personnel_name
                        .clone()
                        .unwrap_or_else(|| format!("#{}", record.personnel_id)),
                ),
            )
            .child(el("span").class("item-time").text(record.timestamp().unwrap_or("N/A")))
            .child(el("span").class("item-type").text(record.kind().label()))
            .child(
                el("div")
                    .class("item-status")
                    .class(if record.is_late() { "status-late" } else { "status-ontime" })
                    .text(if record.is_late() { "Late" } else { "On Time" }),
            )
    }))
}

fn render_state(state: &AttendanceState) -> Node {
    let mut camera = el("div")
        .class("camera-wrapper")
        .attr("data-state", state.capture.as_str());
    if let Some(status) = &state.camera_status {
        camera = camera.child(el("div").id("camera-status").class("camera-status").text(status.clone()));
    }
    if let Some(face) = &state.face_box {
        camera = camera.child(
            el("div")
                .id("face-detection-box")
                .attr("data-x", face.x.to_string())
                .attr("data-y", face.y.to_string())
                .attr("data-width", face.width.to_string())
                .attr("data-height", face.height.to_string()),
        );
    }

    page("attendance-container", "Face Recognition Attendance")
        .child(
            el("div")
                .class("attendance-mode-selector")
                .child(mode_button(AttendanceType::In, state.mode))
                .child(mode_button(AttendanceType::Out, state.mode)),
        )
        .child(
            el("div")
                .class("camera-container")
                .child(
                    el("button")
                        .id("camera-toggle")
                        .class("btn btn-sm btn-outline")
                        .text(if state.camera_active { "Turn Off" } else { "Turn On" }),
                )
                .child(camera)
                .child(
                    el("div")
                        .class("detection-status")
                        .text("Face Detection: ")
                        .child(
                            el("span")
                                .id("detection-status")
                                .text(if state.capturing { "Active" } else { "Inactive" }),
                        ),
                )
                .child(
                    el("button")
                        .id("capture-toggle")
                        .class("btn")
                        .class(if state.capturing { "btn-danger" } else { "btn-primary" })
                        .text(if state.capturing { "Stop Detection" } else { "Start Detection" }),
                ),
        )
        .child(recognition_panel(state))
        .child(
            el("div")
                .class("recent-attendance")
                .child(el("h2").class("recent-title").text("Recent Attendance"))
                .child(
                    el("a")
                        .attr("href", "#/attendance/records")
                        .class("view-all")
                        .text("View All"),
                )
                .child(recent_list(state)),
        )
        .into()
}

#[async_trait]
impl View for AttendanceView {
    fn kind(&self) -> ViewKind {
        ViewKind::Attendance
    }

    fn render(&self) -> Node {
        render_state(&self.shared.lock())
    }

    fn attach(&mut self) {
        let outlet = self.shared.outlet.clone();
        for target in ["mode-in", "mode-out", "camera-toggle", "capture-toggle", "retry-button"] {
            self.listeners.add(&outlet, UiEventKind::Click, target);
        }
    }

    async fn load(&mut self) -> ViewResult<()> {
        self.shared.load_recent().await;
        self.start_camera().await;
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent) -> ViewResult<ViewAction> {
        match event.target() {
            "mode-in" => self.shared.lock().mode = AttendanceType::In,
            "mode-out" => self.shared.lock().mode = AttendanceType::Out,
            "camera-toggle" => {
                let active = self.shared.lock().camera_active;
                if active {
                    self.stop_camera();
                } else {
                    self.start_camera().await;
                }
            }
            "capture-toggle" => {
                let capturing = self.shared.lock().capturing;
                if capturing {
                    self.stop_detection();
                } else {
                    self.start_detection();
                }
            }
            "retry-button" => self.retry(),
            _ => {}
        }
        Ok(ViewAction::None)
    }

    fn destroy(&mut self) {
        self.stop_camera();
        {
            let _state = self.shared.lock();
            self.shared.destroyed.store(true, Ordering::SeqCst);
        }
        // an in-flight recording finishes on its own; it only holds the shared state
        self.consumer = None;
        self.listeners.release(&self.shared.outlet);
        self.shared.outlet.clear();
    }
}
