use std::sync::{Arc, Mutex};

use arbengine::port::{Alert, Notifier};

/// Thread-safe alert collector for notification assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().expect("lock notifier alerts").len()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().expect("lock notifier alerts").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, alert: Alert) {
        self.alerts
            .lock()
            .expect("lock notifier alerts")
            .push(alert);
    }
}
