//! Outbound notification seam. Delivery (chat, mail) lives behind the trait;
//! the engine only fires events and never waits on or fails with delivery.

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    Created,
    StatusChanged,
    Assigned,
    CommentAdded,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::StatusChanged => "status_changed",
            Self::Assigned => "assigned",
            Self::CommentAdded => "comment_added",
        }
    }
}

/// Fire-and-forget: implementations must not block and must swallow their
/// own delivery failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: i32, ticket_number: &str, event: NotificationEvent, details: &str);
}

/// Default collaborator: records the event in the log and nothing else.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: i32, ticket_number: &str, event: NotificationEvent, details: &str) {
        info!(
            recipient,
            ticket_number,
            event = event.as_str(),
            details,
            "ticket notification"
        );
    }
}
