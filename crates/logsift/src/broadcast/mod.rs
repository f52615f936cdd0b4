//! Real-time notifications to the user who owns a job.

pub mod hub;
pub mod job_update;
pub mod notifier;

pub use hub::NotificationHub;
pub use job_update::JobPhase;
pub use notifier::{EventType, NoopNotifier, Notification, Notifier};
