use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Kind of message pushed to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    /// Plain-text job state message.
    #[serde(rename = "job-update")]
    JobUpdate,
    /// JSON object with the changed `file_stats` columns.
    #[serde(rename = "log-table-update")]
    LogTableUpdate,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::JobUpdate => "job-update",
            EventType::LogTableUpdate => "log-table-update",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire message: `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
}

/// Push channel to connected users. Delivery is best effort and never fails
/// the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: &str, event_type: EventType, data: Value);
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _user_id: &str, _event_type: EventType, _data: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let n = Notification {
            event_type: EventType::LogTableUpdate,
            data: serde_json::json!({"file_id": 3}),
        };
        assert_eq!(
            serde_json::to_string(&n).unwrap(),
            r#"{"type":"log-table-update","data":{"file_id":3}}"#
        );
        assert_eq!(EventType::JobUpdate.to_string(), "job-update");
    }
}
