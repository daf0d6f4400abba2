use super::event::RawNotification;

/// Per-root queue of raw notifications, filled by the watcher callback and
/// drained once per idle tick.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<RawNotification>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notification. Any earlier entry with the same path and change
    /// kind is dropped first, so repeated notifications keep only the latest.
    pub fn push(&mut self, notification: RawNotification) {
        self.events
            .retain(|e| !(e.path == notification.path && e.kind == notification.kind));
        self.events.push(notification);
    }

    /// Take the full contents in arrival order, leaving the buffer empty.
    pub fn drain_all(&mut self) -> Vec<RawNotification> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
