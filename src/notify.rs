use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A message surfaced to the person operating the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    pub timestamp: SystemTime,
}

impl Notification {
    pub fn new<T: Into<String>, D: Into<String>>(
        level: NotificationLevel,
        title: T,
        description: D,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn success<T: Into<String>, D: Into<String>>(title: T, description: D) -> Self {
        Self::new(NotificationLevel::Success, title, description)
    }

    pub fn warning<T: Into<String>, D: Into<String>>(title: T, description: D) -> Self {
        Self::new(NotificationLevel::Warning, title, description)
    }

    pub fn error<T: Into<String>, D: Into<String>>(title: T, description: D) -> Self {
        Self::new(NotificationLevel::Error, title, description)
    }

    /// Report a failed remote call as "Error <status>" with the server's message
    pub fn from_api_error(error: &ApiError) -> Self {
        match error {
            ApiError::Remote { status, message } => {
                Self::error(format!("Error {}", status), message.as_str())
            }
            ApiError::NotFound { .. } => Self::error("Error 404", error.to_string()),
            _ => Self::error("Error", error.to_string()),
        }
    }

    /// Get a human-readable one-line rendering
    pub fn describe(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, self.description)
        }
    }
}

/// Broadcast channel carrying notifications to whatever renders them
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Create a new bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish to all subscribers, returning how many received it.
    /// Nobody listening is fine: the notification is still logged.
    pub fn publish(&self, notification: Notification) -> usize {
        match notification.level {
            NotificationLevel::Success | NotificationLevel::Info => {
                info!("{}", notification.describe())
            }
            NotificationLevel::Warning => warn!("{}", notification.describe()),
            NotificationLevel::Error => error!("{}", notification.describe()),
        }

        match self.sender.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Notification published without subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for NotificationBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Drain everything currently queued on a receiver
pub fn drain(receiver: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut drained = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(notification) => drained.push(notification),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!("Notification receiver lagged, skipped {} messages", skipped);
            }
            Err(_) => break,
        }
    }
    drained
}
