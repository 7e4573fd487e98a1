use std::sync::{Arc, Mutex};

use stagehand::port::{Event, Listener};

/// Thread-safe event collector for listener assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("lock listener events").clone()
    }

    /// Short labels for every event, in order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.events()
            .iter()
            .map(|event| match event {
                Event::BeforeReconcile { .. } => "before-reconcile",
                Event::AppChange(_) => "app-change",
                Event::NoAppChange(_) => "no-app-change",
                Event::Reconciled(_) => "reconciled",
                Event::BeforeFirstMount => "before-first-mount",
                Event::FirstMount => "first-mount",
            })
            .collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.labels().into_iter().filter(|l| *l == label).count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("lock listener events").clear();
    }
}

impl Listener for RecordingListener {
    fn notify(&self, event: Event) {
        self.events
            .lock()
            .expect("lock listener events")
            .push(event);
    }
}
