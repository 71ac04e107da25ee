//! Face detection loop
//!
//! Detection runs as a task that grabs a frame, asks the detector about it
//! and sleeps for the capture interval (or the longer error backoff) before
//! the next tick. Stopping wins every race: a stop signal cancels an
//! in-flight detection, so no tick result is published after it. A match
//! ends the loop on its own; what happens next is up to the receiver.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::camera::{Camera, CameraError, CameraResult, Frame, MediaStream};
use crate::api::dto::{DetectedFace, DetectionResponse, Personnel};
use crate::api::ApiResult;
use crate::config::FaceConfig;
use crate::services::FaceService;

/// Where the attendance capture flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    CameraActive,
    Detecting,
    MatchFound,
    Recording,
    Succeeded,
    Failed,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::CameraActive => "camera-active",
            CaptureState::Detecting => "detecting",
            CaptureState::MatchFound => "match-found",
            CaptureState::Recording => "recording",
            CaptureState::Succeeded => "success",
            CaptureState::Failed => "retry",
        }
    }

    /// Whether a finished attendance attempt is waiting for "Try Again"
    pub fn awaiting_retry(&self) -> bool {
        matches!(self, CaptureState::Succeeded | CaptureState::Failed)
    }
}

/// Anything that can look for faces in a frame
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> ApiResult<DetectionResponse>;
}

#[async_trait]
impl FaceDetector for FaceService {
    async fn detect(&self, frame: &Frame) -> ApiResult<DetectionResponse> {
        FaceService::detect(self, frame).await
    }
}

/// Loop timing and match threshold
#[derive(Debug, Clone, Copy)]
pub struct DetectionSettings {
    pub interval: Duration,
    pub error_backoff: Duration,
    pub min_confidence: f64,
}

impl From<&FaceConfig> for DetectionSettings {
    fn from(config: &FaceConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.capture_interval_ms),
            error_backoff: Duration::from_millis(config.error_backoff_ms),
            min_confidence: config.min_confidence,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::from(&FaceConfig::default())
    }
}

/// What a tick found
#[derive(Debug, Clone)]
pub enum DetectionEvent {
    /// Faces were seen; the first is reported for the overlay box
    Face(DetectedFace),
    /// A face above the threshold with a known identity; the loop has ended
    Matched { personnel: Personnel, confidence: f64 },
}

/// Control handle of a running detection loop
///
/// Dropping the handle stops the loop.
pub struct DetectionHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<u64>>,
}

impl DetectionHandle {
    /// Signal the loop to stop; an in-flight detection is abandoned
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop and wait for the task; returns the number of ticks it ran
    pub async fn join(mut self) -> u64 {
        self.stop();
        match self.task.take() {
            Some(task) => task.await.unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for DetectionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start polling `stream` for faces; events go to `events`
pub fn spawn_detection(
    camera: Arc<dyn Camera>,
    stream: MediaStream,
    detector: Arc<dyn FaceDetector>,
    settings: DetectionSettings,
    events: mpsc::UnboundedSender<DetectionEvent>,
) -> CameraResult<DetectionHandle> {
    if !stream.is_live() {
        return Err(CameraError::NotStarted);
    }

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticks = 0u64;
        loop {
            let tick = tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                tick = detect_once(camera.as_ref(), &stream, detector.as_ref()) => tick,
            };
            ticks += 1;

            let delay = match tick {
                Ok(response) => {
                    if let Some(event) = interpret(&response, settings.min_confidence) {
                        let matched = matches!(event, DetectionEvent::Matched { .. });
                        if events.send(event).is_err() || matched {
                            break;
                        }
                    }
                    settings.interval
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Face detection tick failed");
                    settings.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::debug!(ticks, "Face detection stopped");
        ticks
    });

    Ok(DetectionHandle {
        stop: stop_tx,
        task: Some(task),
    })
}

#[derive(Debug, thiserror::Error)]
enum TickError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Api(#[from] crate::api::ApiError),
}

async fn detect_once(
    camera: &dyn Camera,
    stream: &MediaStream,
    detector: &dyn FaceDetector,
) -> Result<DetectionResponse, TickError> {
    let frame = camera.capture(stream).await?;
    Ok(detector.detect(&frame).await?)
}

/// Turn a detection response into an event, if it has anything to say
pub fn interpret(response: &DetectionResponse, min_confidence: f64) -> Option<DetectionEvent> {
    if !response.success {
        return None;
    }
    let face = response.primary_face()?;
    match face.matched(min_confidence) {
        Some(personnel) => Some(DetectionEvent::Matched {
            personnel: personnel.clone(),
            confidence: face.confidence,
        }),
        None => Some(DetectionEvent::Face(face.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::testing::FakeCamera;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers from a list, repeating the last answer
    struct ScriptedDetector {
        answers: Mutex<Vec<ApiResult<DetectionResponse>>>,
        calls: AtomicUsize,
        latency: Duration,
    }

    impl ScriptedDetector {
        fn new(answers: Vec<ApiResult<DetectionResponse>>, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
                latency,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FaceDetector for ScriptedDetector {
        async fn detect(&self, _frame: &Frame) -> ApiResult<DetectionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0].clone()
            }
        }
    }

    fn face(confidence: f64, personnel: bool) -> ApiResult<DetectionResponse> {
        let mut face = json!({
            "box": {"x": 10, "y": 20, "width": 80, "height": 80},
            "confidence": confidence,
        });
        if personnel {
            face["personnel"] = json!({"id": 7, "name": "Juan Dela Cruz"});
        }
        Ok(serde_json::from_value(json!({"success": true, "faces": [face]})).unwrap())
    }

    fn start(
        detector: Arc<ScriptedDetector>,
    ) -> (
        DetectionHandle,
        mpsc::UnboundedReceiver<DetectionEvent>,
        MediaStream,
    ) {
        let camera: Arc<dyn Camera> = Arc::new(FakeCamera::new());
        let stream = MediaStream::new("test");
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_detection(
            camera,
            stream.clone(),
            detector,
            DetectionSettings::default(),
            tx,
        )
        .unwrap();
        (handle, rx, stream)
    }

    #[test]
    fn test_interpret_threshold() {
        let low = face(0.65, true).unwrap();
        assert!(matches!(interpret(&low, 0.7), Some(DetectionEvent::Face(_))));

        let high = face(0.82, true).unwrap();
        match interpret(&high, 0.7) {
            Some(DetectionEvent::Matched { personnel, confidence }) => {
                assert_eq!(personnel.id, 7);
                assert!((confidence - 0.82).abs() < f64::EPSILON);
            }
            other => panic!("expected match, got {:?}", other),
        }

        // confident but unknown face is not a match
        let unknown = face(0.95, false).unwrap();
        assert!(matches!(interpret(&unknown, 0.7), Some(DetectionEvent::Face(_))));

        let empty: DetectionResponse =
            serde_json::from_value(json!({"success": true, "faces": []})).unwrap();
        assert!(interpret(&empty, 0.7).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_confidence_keeps_polling() {
        let detector = ScriptedDetector::new(vec![face(0.65, true)], Duration::ZERO);
        let (handle, mut rx, _) = start(detector.clone());

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(handle.is_running());
        // ticks at 0, 500, 1000, 1500, 2000
        assert_eq!(detector.calls(), 5);
        assert!(matches!(rx.try_recv(), Ok(DetectionEvent::Face(_))));

        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_ends_loop() {
        let detector = ScriptedDetector::new(
            vec![face(0.65, true), face(0.82, true)],
            Duration::ZERO,
        );
        let (handle, mut rx, _) = start(detector.clone());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(matches!(rx.recv().await, Some(DetectionEvent::Face(_))));
        assert!(matches!(rx.recv().await, Some(DetectionEvent::Matched { .. })));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!handle.is_running());
        assert_eq!(detector.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_back_off() {
        let detector = ScriptedDetector::new(
            vec![Err(ApiError::Status {
                status: 503,
                message: "busy".to_string(),
            })],
            Duration::ZERO,
        );
        let (handle, _rx, _) = start(detector.clone());

        tokio::time::sleep(Duration::from_millis(2100)).await;
        // ticks at 0, 1000, 2000
        assert_eq!(detector.calls(), 3);
        assert!(handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_in_flight_detection() {
        // a match is on its way when stop arrives
        let detector = ScriptedDetector::new(vec![face(0.9, true)], Duration::from_millis(300));
        let (handle, mut rx, _) = start(detector.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(detector.calls(), 1);
        let ticks = handle.join().await;

        assert_eq!(ticks, 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_sleep_is_prompt() {
        let detector = ScriptedDetector::new(vec![face(0.5, true)], Duration::ZERO);
        let (handle, _rx, _) = start(detector.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_running());
        assert_eq!(detector.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_camera_counts_as_error() {
        let detector = ScriptedDetector::new(vec![face(0.9, true)], Duration::ZERO);
        let camera: Arc<dyn Camera> = Arc::new(FakeCamera::new());
        let stream = MediaStream::new("test");
        let (tx, _rx) = mpsc::unbounded_channel();

        stream.stop();
        let refused = spawn_detection(
            camera,
            stream,
            detector.clone(),
            DetectionSettings::default(),
            tx,
        );
        assert!(matches!(refused, Err(CameraError::NotStarted)));
        assert_eq!(detector.calls(), 0);
    }
}
