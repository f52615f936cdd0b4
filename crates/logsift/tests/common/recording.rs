#![allow(dead_code)]

use std::sync::Mutex;

use serde_json::Value;

use logsift::broadcast::{EventType, Notification, Notifier};

/// Notifier that keeps everything it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<(String, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    /// `job-update` texts sent to `user`, in order.
    pub fn job_updates(&self, user: &str) -> Vec<String> {
        self.of_type(user, EventType::JobUpdate)
            .into_iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// `log-table-update` bodies sent to `user`, in order.
    pub fn table_updates(&self, user: &str) -> Vec<Value> {
        self.of_type(user, EventType::LogTableUpdate)
    }

    /// Terminal `job-update` messages (`completed` or `failed`) for `job_id`.
    pub fn terminal_updates(&self, user: &str, job_id: &str) -> Vec<String> {
        let completed = format!("Job {} completed", job_id);
        let failed = format!("Job {} failed", job_id);
        self.job_updates(user)
            .into_iter()
            .filter(|m| *m == completed || *m == failed)
            .collect()
    }

    fn of_type(&self, user: &str, event_type: EventType) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, n)| u == user && n.event_type == event_type)
            .map(|(_, n)| n.data.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user_id: &str, event_type: EventType, data: Value) {
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), Notification { event_type, data }));
    }
}
