//! Critical error reporting.
//!
//! Every failure the client raises is written to the log and handed to a
//! [`Notifier`] together with the merchant's notification addresses.

use std::sync::Arc;

/// Delivers critical error messages to the merchant.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipients: &[String], subject: &str, message: &str);
}

/// Records the notification in the log instead of sending it anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipients: &[String], subject: &str, message: &str) {
        tracing::info!(
            recipients = %recipients.join(","),
            subject = %subject,
            "Notification not delivered (no mail transport configured): {}",
            message
        );
    }
}

pub(crate) const SUBJECT: &str = "Pay.nl Critical error";

#[derive(Clone)]
pub(crate) struct ErrorReporter {
    recipients: Vec<String>,
    notifier: Arc<dyn Notifier>,
}

impl ErrorReporter {
    pub(crate) fn new(recipients: Vec<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            recipients,
            notifier,
        }
    }

    pub(crate) fn report(&self, message: &str) {
        tracing::error!("Pay.nl [critical error]: {}", message);
        self.notifier.notify(&self.recipients, SUBJECT, message);
    }
}
