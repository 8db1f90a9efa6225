// ABOUTME: Lifecycle notifications emitted around provider up/down.
// ABOUTME: Broadcast to any number of listeners; delivery is not synchronous.

use std::fmt;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    PreUp,
    PostUp,
    PreDown,
    PostDown,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleEvent::PreUp => "pre-up",
            LifecycleEvent::PostUp => "post-up",
            LifecycleEvent::PreDown => "pre-down",
            LifecycleEvent::PostDown => "post-down",
        })
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(%event, "emitting lifecycle event");
        // No listeners is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
