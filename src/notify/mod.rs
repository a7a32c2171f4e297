//! Global notification channel.
//!
//! Flows that finish in the background report their terminal outcome here;
//! the UI drains the receiver each frame and shows the latest notice in the
//! status bar. The sender half (`Notifier`) is cheap to clone and safe to
//! use from spawned tasks.

use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    /// Create the channel, returning the sender handle and the UI's receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Info, title.into(), message.into());
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Success, title.into(), message.into());
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, title.into(), message.into());
    }

    fn push(&self, severity: Severity, title: String, message: String) {
        let notice = Notice {
            severity,
            title,
            message,
        };
        if self.tx.send(notice).is_err() {
            // Receiver gone during shutdown; nothing left to show it to
            debug!("notice dropped - channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notices_arrive_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.error("Sign in", "Invalid email or password");
        notifier.success("Sign in", "Welcome back");

        let first = rx.try_recv().expect("first notice");
        assert_eq!(first.severity, Severity::Error);
        assert_eq!(first.message, "Invalid email or password");

        let second = rx.try_recv().expect("second notice");
        assert_eq!(second.severity, Severity::Success);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.info("Sync", "done");
    }
}
