//! Outlet
//!
//! The subtree a mounted view owns. A view renders into it and registers the
//! interactions it handles; input that no listener claims is dropped before it
//! reaches the view.

use std::sync::{Arc, Mutex, MutexGuard};

use super::node::Node;

/// Kinds of user interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiEventKind {
    Click,
    Input,
    Submit,
}

/// A user interaction aimed at an element id
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Click { target: String },
    Input { target: String, value: String },
    Submit { target: String },
}

impl UiEvent {
    pub fn click(target: &str) -> Self {
        UiEvent::Click {
            target: target.to_string(),
        }
    }

    pub fn input(target: &str, value: impl Into<String>) -> Self {
        UiEvent::Input {
            target: target.to_string(),
            value: value.into(),
        }
    }

    pub fn submit(target: &str) -> Self {
        UiEvent::Submit {
            target: target.to_string(),
        }
    }

    pub fn kind(&self) -> UiEventKind {
        match self {
            UiEvent::Click { .. } => UiEventKind::Click,
            UiEvent::Input { .. } => UiEventKind::Input,
            UiEvent::Submit { .. } => UiEventKind::Submit,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            UiEvent::Click { target } | UiEvent::Input { target, .. } | UiEvent::Submit { target } => {
                target
            }
        }
    }

    /// Parse `click <id>`, `input <id> <value...>` or `submit <id>`
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.trim().splitn(3, ' ');
        let action = words.next()?;
        let target = words.next().filter(|t| !t.is_empty())?;
        match action {
            "click" => Some(UiEvent::click(target)),
            "submit" => Some(UiEvent::submit(target)),
            "input" => Some(UiEvent::input(target, words.next().unwrap_or_default())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
struct OutletInner {
    content: Option<Node>,
    listeners: Vec<(ListenerId, UiEventKind, String)>,
    next_id: u64,
}

/// Shared handle to the mount point
#[derive(Debug, Clone, Default)]
pub struct Outlet {
    inner: Arc<Mutex<OutletInner>>,
}

impl Outlet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, OutletInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the outlet's content
    pub fn render(&self, node: Node) {
        self.lock().content = Some(node);
    }

    pub fn content(&self) -> Option<Node> {
        self.lock().content.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().content.is_none()
    }

    pub fn clear(&self) {
        self.lock().content = None;
    }

    pub fn listen(&self, kind: UiEventKind, target: &str) -> ListenerId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.listeners.push((id, kind, target.to_string()));
        id
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _, _)| *lid != id);
        inner.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Whether some listener handles this interaction
    pub fn accepts(&self, event: &UiEvent) -> bool {
        let kind = event.kind();
        self.lock()
            .listeners
            .iter()
            .any(|(_, k, target)| *k == kind && target_matches(target, event.target()))
    }
}

/// A listener target ending in `*` claims every id with that prefix, so one
/// listener covers per-row buttons such as `delete-4`
fn target_matches(pattern: &str, target: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => target.len() > prefix.len() && target.starts_with(prefix),
        None => pattern == target,
    }
}

/// Numeric suffix of a row target: `row_id("delete-4", "delete-")` is 4
pub fn row_id(target: &str, prefix: &str) -> Option<u64> {
    target.strip_prefix(prefix)?.parse().ok()
}

/// Listener ids registered by one view, released together on destroy
#[derive(Debug, Default)]
pub struct Listeners {
    ids: Vec<ListenerId>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outlet: &Outlet, kind: UiEventKind, target: &str) {
        self.ids.push(outlet.listen(kind, target));
    }

    pub fn release(&mut self, outlet: &Outlet) {
        for id in self.ids.drain(..) {
            outlet.unlisten(id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
