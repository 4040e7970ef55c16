use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::SmtpConfig;

/// Outbound email capability. Invoked exactly once per successful signup;
/// delivery failure is never rolled back against the user record.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build()
            }
            // Local relay (Mailpit, MailHog, plain postfix) without auth or TLS.
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build(),
        };
        Ok(Self {
            transport,
            from_email: config.from_email.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from_email.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(email).await?;
        debug!(%to, "email dispatched");
        Ok(())
    }
}

/// In-memory mailer for tests; records every message for inspection.
/// Clones share the same underlying log.
#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mailer_records_messages() {
        let mailer = MockMailer::new();
        mailer
            .send("neo@matrix.io", "Registration confirmation", "code: 42")
            .await
            .expect("mock send");
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "neo@matrix.io");
        assert!(sent[0].2.contains("42"));
    }
}
