use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::api::types::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: ToastLevel,
    pub message_en: String,
    pub message_th: String,
    /// Whether the UI should offer a retry action.
    pub retryable: bool,
}

impl Notification {
    pub fn new(level: ToastLevel, message_en: &str, message_th: &str) -> Self {
        Self {
            level,
            message_en: message_en.to_string(),
            message_th: message_th.to_string(),
            retryable: false,
        }
    }

    pub fn permission_denied() -> Self {
        Self::new(
            ToastLevel::Warning,
            "You do not have permission to access this page.",
            "คุณไม่มีสิทธิ์เข้าถึงหน้านี้",
        )
    }

    pub fn text(&self, locale: Locale) -> &str {
        match locale {
            Locale::Th => &self.message_th,
            Locale::En => &self.message_en,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Delivers a notification, falling back to a log line when no notifier is
/// wired up or delivery fails. Never panics.
pub fn dispatch(notifier: Option<&dyn Notifier>, notification: Notification) {
    let Some(notifier) = notifier else {
        tracing::warn!(
            level = ?notification.level,
            message = %notification.message_en,
            "No notifier available"
        );
        return;
    };
    let level = notification.level;
    let message = notification.message_en.clone();
    if let Err(err) = notifier.notify(notification) {
        tracing::warn!(?level, %message, error = %err, "Failed to deliver notification");
    }
}

/// Writes toasts to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        match notification.level {
            ToastLevel::Error => tracing::error!(
                th = %notification.message_th,
                retryable = notification.retryable,
                "{}",
                notification.message_en
            ),
            ToastLevel::Warning => {
                tracing::warn!(th = %notification.message_th, "{}", notification.message_en)
            }
            ToastLevel::Info | ToastLevel::Success => {
                tracing::info!(th = %notification.message_th, "{}", notification.message_en)
            }
        }
        Ok(())
    }
}

/// Queues toasts for a UI layer to drain.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    queue: Mutex<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Unavailable("translations not loaded".into()))
        }
    }

    #[test]
    fn dispatch_degrades_without_panicking() {
        dispatch(None, Notification::permission_denied());
        dispatch(Some(&Broken), Notification::permission_denied());
    }

    #[test]
    fn in_memory_notifier_queues_until_drained() {
        let notifier = InMemoryNotifier::new();
        dispatch(Some(&notifier), Notification::permission_denied());
        let drained = notifier.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].text(Locale::Th), "คุณไม่มีสิทธิ์เข้าถึงหน้านี้");
        assert_eq!(
            drained[0].text(Locale::En),
            "You do not have permission to access this page."
        );
        assert!(notifier.drain().is_empty());
    }
}
