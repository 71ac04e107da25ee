//! Notification service
//!
//! Toasts are shown at most `max_visible` at a time; the rest wait in FIFO
//! order and are promoted as visible ones are dismissed. A visible toast with
//! a non-zero duration is dismissed by a timer started when it became visible.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn default_duration(&self) -> Duration {
        match self {
            Severity::Success => Duration::from_millis(5000),
            Severity::Error => Duration::from_millis(8000),
            Severity::Warning => Duration::from_millis(7000),
            Severity::Info => Duration::from_millis(5000),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToastId(pub u64);

/// One notification
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub severity: Severity,
    /// Zero keeps the toast until dismissed
    pub duration: Duration,
    pub dismissable: bool,
}

/// Visible toasts plus the FIFO of waiting ones
#[derive(Debug)]
pub struct ToastQueue {
    max_visible: usize,
    visible: Vec<Toast>,
    pending: VecDeque<Toast>,
    next_id: u64,
}

impl ToastQueue {
    pub fn new(max_visible: usize) -> Self {
        Self {
            max_visible: max_visible.max(1),
            visible: Vec::new(),
            pending: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Queue a toast; returns its id and the toasts that became visible
    pub fn push(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
        dismissable: bool,
    ) -> (ToastId, Vec<Toast>) {
        self.next_id += 1;
        let id = ToastId(self.next_id);
        self.pending.push_back(Toast {
            id,
            message: message.into(),
            severity,
            duration,
            dismissable,
        });
        (id, self.promote())
    }

    /// Remove a toast wherever it is; returns the toasts promoted in its place
    pub fn dismiss(&mut self, id: ToastId) -> Vec<Toast> {
        if let Some(pos) = self.visible.iter().position(|t| t.id == id) {
            self.visible.remove(pos);
            return self.promote();
        }
        self.pending.retain(|t| t.id != id);
        Vec::new()
    }

    pub fn clear(&mut self) {
        self.visible.clear();
        self.pending.clear();
    }

    fn promote(&mut self) -> Vec<Toast> {
        let mut shown = Vec::new();
        while self.visible.len() < self.max_visible {
            let Some(next) = self.pending.pop_front() else {
                break;
            };
            self.visible.push(next.clone());
            shown.push(next);
        }
        shown
    }

    pub fn visible(&self) -> &[Toast] {
        &self.visible
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Shared toast queue with auto-dismiss timers
#[derive(Clone)]
pub struct NotificationService {
    queue: Arc<Mutex<ToastQueue>>,
}

impl NotificationService {
    pub fn new(max_visible: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(ToastQueue::new(max_visible))),
        }
    }

    /// Show a toast with its severity's default duration
    pub fn show(&self, message: impl Into<String>, severity: Severity) -> ToastId {
        self.show_with(message, severity, severity.default_duration(), true)
    }

    pub fn show_with(
        &self,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
        dismissable: bool,
    ) -> ToastId {
        let message = message.into();
        tracing::debug!(severity = severity.as_str(), message = %message, "Notification");

        let (id, shown) = lock(&self.queue).push(message, severity, duration, dismissable);
        schedule(&self.queue, shown);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.show(message, Severity::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.show(message, Severity::Error)
    }

    pub fn warning(&self, message: impl Into<String>) -> ToastId {
        self.show(message, Severity::Warning)
    }

    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.show(message, Severity::Info)
    }

    pub fn dismiss(&self, id: ToastId) {
        dismiss(&self.queue, id);
    }

    pub fn clear_all(&self) {
        lock(&self.queue).clear();
    }

    /// Snapshot of the visible toasts, oldest first
    pub fn visible(&self) -> Vec<Toast> {
        lock(&self.queue).visible().to_vec()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.queue).pending_len()
    }
}

fn lock(queue: &Mutex<ToastQueue>) -> MutexGuard<'_, ToastQueue> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn dismiss(queue: &Arc<Mutex<ToastQueue>>, id: ToastId) {
    let shown = lock(queue).dismiss(id);
    schedule(queue, shown);
}

/// Start auto-dismiss timers for toasts that just became visible
fn schedule(queue: &Arc<Mutex<ToastQueue>>, shown: Vec<Toast>) {
    for toast in shown {
        if toast.duration.is_zero() {
            continue;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(toast = toast.id.0, "No runtime, toast will not auto-dismiss");
            continue;
        };
        let queue = Arc::clone(queue);
        handle.spawn(async move {
            tokio::time::sleep(toast.duration).await;
            dismiss(&queue, toast.id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_never_exceeds_max_and_is_fifo() {
        let mut queue = ToastQueue::new(3);
        let mut ids = Vec::new();
        for i in 0..5 {
            let (id, _) = queue.push(format!("t{}", i), Severity::Info, Duration::ZERO, true);
            ids.push(id);
            assert!(queue.visible().len() <= 3);
        }
        assert_eq!(queue.pending_len(), 2);

        let promoted = queue.dismiss(ids[1]);
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].message, "t3");

        let messages: Vec<&str> = queue.visible().iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["t0", "t2", "t3"]);
    }

    #[test]
    fn test_dismissing_pending_toast_promotes_nothing() {
        let mut queue = ToastQueue::new(1);
        queue.push("a", Severity::Info, Duration::ZERO, true);
        let (b, shown) = queue.push("b", Severity::Info, Duration::ZERO, true);
        assert!(shown.is_empty());

        assert!(queue.dismiss(b).is_empty());
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.visible().len(), 1);
    }

    #[test]
    fn test_severity_durations() {
        assert_eq!(Severity::Success.default_duration(), Duration::from_secs(5));
        assert_eq!(Severity::Error.default_duration(), Duration::from_secs(8));
        assert_eq!(Severity::Warning.default_duration(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_start_when_toast_becomes_visible() {
        let service = NotificationService::new(1);
        service.show_with("first", Severity::Info, Duration::from_secs(5), true);
        service.show_with("second", Severity::Info, Duration::from_secs(5), true);

        tokio::time::sleep(Duration::from_millis(5100)).await;
        let visible = service.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].message, "second");

        // second's timer started at promotion, not at show
        tokio::time::sleep(Duration::from_millis(4800)).await;
        assert_eq!(service.visible().len(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(service.visible().is_empty());
    }

    #[test]
    fn test_poisoned_queue_still_shows_toasts() {
        let service = NotificationService::new(3);
        let queue = Arc::clone(&service.queue);
        let _ = std::thread::spawn(move || {
            let _guard = queue.lock().unwrap();
            panic!("poison the toast queue");
        })
        .join();
        assert!(service.queue.is_poisoned());

        let id = service.show_with("still here", Severity::Error, Duration::ZERO, true);

        assert_ne!(id, ToastId(0));
        assert_eq!(service.visible()[0].message, "still here");
        service.dismiss(id);
        assert!(service.visible().is_empty());
        assert_eq!(service.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticky_toast_stays() {
        let service = NotificationService::new(3);
        let id = service.show_with("sticky", Severity::Error, Duration::ZERO, true);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.visible().len(), 1);

        service.dismiss(id);
        assert!(service.visible().is_empty());
    }
}
