//! Error types for the notification system

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("Failed to publish {} event to {} subscribers: {:?}", .event_type, .failed_subscribers.len(), .failed_subscribers)]
    PublishFailed {
        event_type: String,
        failed_subscribers: Vec<String>,
    },

    #[error("Notification manager unavailable: {message}")]
    Unavailable { message: String },
}

impl crate::core::error_handling::ContextualError for NotificationError {
    fn is_user_actionable(&self) -> bool {
        false // All notification errors are system-level
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}
