use std::collections::HashMap;
use std::sync::RwLock;

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::broadcast;

use super::notifier::{EventType, Notification, Notifier};

const DEFAULT_CAPACITY: usize = 64;

/// Registry of connected users, one live connection each.
///
/// A connection is the receiving half of a broadcast channel. Connecting again
/// replaces the previous connection, whose receiver then sees the channel
/// closed. A send that finds no receiver drops the registration.
pub struct NotificationHub {
    clients: RwLock<HashMap<String, broadcast::Sender<Notification>>>,
    capacity: usize,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn connect(&self, user_id: &str) -> broadcast::Receiver<Notification> {
        let (sender, receiver) = broadcast::channel(self.capacity);
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if clients.insert(user_id.to_string(), sender).is_some() {
            debug!("Replaced existing connection for user {}", user_id);
        }
        receiver
    }

    pub fn disconnect(&self, user_id: &str) {
        self.clients
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(user_id);
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.clients
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, user_id: &str, event_type: EventType, data: Value) {
        let sender = self
            .clients
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(user_id)
            .cloned();

        let Some(sender) = sender else {
            debug!("User {} not connected; dropping {}", user_id, event_type);
            return;
        };

        if sender.send(Notification { event_type, data }).is_err() {
            warn!(
                "Failed to deliver {} to user {}; removing connection",
                event_type, user_id
            );
            let mut clients = self
                .clients
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            // Only remove the connection we failed on, not a newer replacement.
            if clients
                .get(user_id)
                .is_some_and(|current| current.same_channel(&sender))
            {
                clients.remove(user_id);
            }
        }
    }
}
