use courier_core::config::MailConfig;
use courier_core::mail::{Email, MailError, Mailer};
use futures::future::BoxFuture;

/// Mailer that writes outgoing messages to the log instead of a transport.
///
/// Used when no SMTP transport is configured.
#[derive(Debug, Clone)]
pub struct LogMailer {
    sender_name: String,
    sender_address: String,
}

impl LogMailer {
    pub fn new(sender_name: impl Into<String>, sender_address: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            sender_address: sender_address.into(),
        }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(&config.sender_name, &config.sender_address)
    }

    /// `From` header value.
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.sender_name, self.sender_address)
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async move {
            email.validate()?;
            tracing::info!(
                from = %self.from_header(),
                to = ?email.to,
                cc = ?email.cc,
                bcc = ?email.bcc,
                subject = %email.subject,
                attachments = email.attachments.len(),
                "Email accepted"
            );
            tracing::debug!(content = %email.content, "Email body");
            Ok(())
        })
    }
}
