//! User-visible notifications
//!
//! The core never blocks on a notification; sinks must return promptly.

use log::{info, warn};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    /// Status messages such as a changed repeat mode
    Info,
    /// Recoverable failures
    Error,
}

/// Sink for short, dismissible messages
pub trait Notifier: Send + Sync {
    /// Delivers a message
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// Notifier writing to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        match level {
            NotifyLevel::Info => info!("{message}"),
            NotifyLevel::Error => warn!("{message}"),
        }
    }
}
