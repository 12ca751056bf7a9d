// mailer.rs - Contact-form notifications over SMTP
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),

    #[error("Mail delivery is not configured")]
    NotConfigured,
}

/// A validated contact-form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[async_trait]
pub trait ContactNotifier: Send + Sync {
    async fn send_contact(&self, contact: &ContactMessage) -> Result<(), MailError>;
}

/// Used when SMTP is not configured; every send fails.
pub struct DisabledNotifier;

#[async_trait]
impl ContactNotifier for DisabledNotifier {
    async fn send_contact(&self, _contact: &ContactMessage) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

fn single_line(value: &str) -> String {
    value.split(['\r', '\n']).map(str::trim).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Build the notification mail sent to the site owner.
pub fn build_contact_message(from: &str, to: &str, contact: &ContactMessage) -> Result<Message, MailError> {
    let name = single_line(&contact.name);
    let reply_to = Mailbox::new(Some(name.clone()), contact.email.trim().parse()?);

    let body = format!(
        "New message from the contact form\n\nName: {}\nEmail: {}\n\n{}\n",
        name,
        contact.email.trim(),
        contact.message.trim()
    );

    Message::builder()
        .from(from.parse()?)
        .to(to.parse()?)
        .reply_to(reply_to)
        .subject(format!("Contact form: {}", name))
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl ContactNotifier for SmtpMailer {
    async fn send_contact(&self, contact: &ContactMessage) -> Result<(), MailError> {
        let email = build_contact_message(&self.config.from, &self.config.recipient, contact)?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?.port(self.config.port);
        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            transport_builder = transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport_builder.build().send(email).await?;

        tracing::info!(to = %self.config.recipient, "Contact notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> ContactMessage {
        ContactMessage {
            name: "Ada\r\nBcc: x@evil.test".to_string(),
            email: "ada@example.com".to_string(),
            message: "Love the GIF tool".to_string(),
        }
    }

    #[test]
    fn test_build_contact_message() {
        let message = build_contact_message("site@example.com", "owner@example.com", &contact()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Reply-To:"));
        assert!(raw.contains("ada@example.com"));
        assert!(raw.contains("Love the GIF tool"));
        assert!(!raw.contains("\r\nBcc:"));
    }

    #[test]
    fn test_build_rejects_bad_address() {
        let mut bad = contact();
        bad.email = "not-an-email".to_string();
        let err = build_contact_message("site@example.com", "owner@example.com", &bad).unwrap_err();
        assert!(matches!(err, MailError::Address(_)));
    }

    #[tokio::test]
    async fn test_disabled_notifier() {
        let err = DisabledNotifier.send_contact(&contact()).await.unwrap_err();
        assert!(matches!(err, MailError::NotConfigured));
    }
}
