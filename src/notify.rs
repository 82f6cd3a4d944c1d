//! Delivery of notification events.
//!
//! The workflow only emits [`Notification`](crate::appeal::Notification)
//! values; a [`Notifier`] puts them in front of a person. The terminal
//! notifier colours messages with `console` the way a chat client would
//! show them.

use std::io::Write;

use console::Style;
use thiserror::Error;

use crate::appeal::UserId;

/// Who a message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Admin(UserId),
    User(UserId),
}

impl Recipient {
    pub fn chat_id(&self) -> UserId {
        match self {
            Recipient::Admin(id) | Recipient::User(id) => *id,
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends text to a chat recipient.
pub trait Notifier {
    async fn deliver(&self, recipient: Recipient, text: &str) -> Result<(), DeliveryError>;
}

/// Prints deliveries to stdout.
pub struct TerminalNotifier {
    admin: Style,
    user: Style,
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self {
            admin: Style::new().magenta().bold(),
            user: Style::new().cyan().bold(),
        }
    }
}

impl Notifier for TerminalNotifier {
    async fn deliver(&self, recipient: Recipient, text: &str) -> Result<(), DeliveryError> {
        let header = match recipient {
            Recipient::Admin(id) => self.admin.apply_to(format!("📨 to admin {id}")),
            Recipient::User(id) => self.user.apply_to(format!("📨 to user {id}")),
        };
        let mut out = std::io::stdout().lock();
        writeln!(out, "{header}")?;
        for line in text.lines() {
            writeln!(out, "   {line}")?;
        }
        Ok(())
    }
}
