use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Outgoing mail port.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from: &str,
    ) -> Result<Self, DeliveryError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(port);
        if let Some((user, pass)) = credentials {
            builder = builder.credentials(Credentials::new(user, pass));
        }
        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;
        self.transport.send(message).await?;
        debug!(%to, %subject, "mail sent");
        Ok(())
    }
}

/// Used when no SMTP relay is configured; logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        info!(%to, %subject, body_len = html_body.len(), "smtp not configured; mail not sent");
        Ok(())
    }
}

/// Picks the SMTP relay when configured, the logging mailer otherwise.
pub fn from_config(cfg: &MailConfig) -> anyhow::Result<std::sync::Arc<dyn Mailer>> {
    match &cfg.smtp {
        Some(smtp) => {
            let credentials = smtp.username.clone().zip(smtp.password.clone());
            let mailer = SmtpMailer::new(&smtp.host, smtp.port, credentials, &cfg.from)?;
            info!(host = %smtp.host, port = smtp.port, "smtp mailer configured");
            Ok(std::sync::Arc::new(mailer))
        }
        None => Ok(std::sync::Arc::new(LogMailer)),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Subject and HTML body of the account verification email.
pub fn verification_email(username: &str, code: &str) -> (&'static str, String) {
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
body {{ font-family: Arial, sans-serif; background-color: #f4f4f9; color: #333; }}
.container {{ max-width: 600px; margin: 0 auto; padding: 20px; background: #fff; border: 1px solid #ddd; border-radius: 8px; }}
.code {{ text-align: center; font-size: 24px; font-weight: bold; padding: 15px; border: 1px dashed #4CAF50; border-radius: 5px; }}
.footer {{ text-align: center; font-size: 12px; color: #888; padding-top: 20px; }}
</style>
</head>
<body>
<div class="container">
  <h1>Welcome!</h1>
  <p>Hi {username},</p>
  <p>Use the following code to verify your email address:</p>
  <div class="code">{code}</div>
  <p>If you did not sign up for an account, please ignore this email.</p>
  <div class="footer">This code expires shortly after it was sent.</div>
</div>
</body>
</html>"#,
        username = escape_html(username),
        code = escape_html(code),
    );
    ("Account Verification", body)
}

#[cfg(test)]
pub use fakes::{FailingMailer, RecordingMailer};
