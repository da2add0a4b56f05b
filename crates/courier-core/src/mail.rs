use std::path::PathBuf;

use futures::future::BoxFuture;
use thiserror::Error;

/// Mail transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Invalid email: {0}")]
    Invalid(String),

    #[error("Mail transport error: {0}")]
    Transport(String),
}

/// An outgoing email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    /// HTML body.
    pub content: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<PathBuf>,
}

impl Email {
    /// Create an email with subject, HTML body and primary recipients.
    pub fn new(subject: impl Into<String>, content: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            to,
            ..Default::default()
        }
    }

    /// Check the email is deliverable at all.
    pub fn validate(&self) -> Result<(), MailError> {
        if self.to.is_empty() {
            return Err(MailError::Invalid("no recipients".to_string()));
        }
        if self.subject.is_empty() {
            return Err(MailError::Invalid("empty subject".to_string()));
        }
        Ok(())
    }
}

/// Email transport. Makes no retry attempt of its own.
pub trait Mailer: Send + Sync + 'static {
    /// Returns once the transport has accepted the message.
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), MailError>>;
}
