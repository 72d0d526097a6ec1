//! Email delivery of the packaged rate archive.

use std::path::Path;

use chrono::NaiveDate;
use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailSettings;

const BODY: &str = "Please find the attached zip file with the latest data.";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("Invalid content type: {0}")]
    ContentType(#[from] ContentTypeErr),
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("Failed to read attachment: {0}")]
    Io(#[from] std::io::Error),
    #[error("No SMTP host known for '{0}', pass one explicitly")]
    UnknownSmtpHost(String),
}

/// SMTP relay for well known mail providers, keyed by the sender's domain.
pub fn smtp_host_for(address: &str) -> Option<&'static str> {
    let (_, domain) = address.rsplit_once('@')?;
    let provider = domain.split('.').next()?.to_ascii_lowercase();
    match provider.as_str() {
        "hotmail" | "outlook" | "live" => Some("smtp.office365.com"),
        "gmail" | "googlemail" => Some("smtp.gmail.com"),
        _ => None,
    }
}

pub struct EmailNotifier {
    settings: EmailSettings,
}

impl EmailNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    pub fn smtp_host(&self) -> Result<String, NotifyError> {
        match &self.settings.smtp_host {
            Some(host) => Ok(host.clone()),
            None => smtp_host_for(&self.settings.from)
                .map(str::to_string)
                .ok_or_else(|| NotifyError::UnknownSmtpHost(self.settings.from.clone())),
        }
    }

    /// Builds the report message. A missing attachment is logged and the
    /// message goes out with the body only.
    pub fn build_message(&self, today: NaiveDate) -> Result<Message, NotifyError> {
        let from: Mailbox = self.settings.from.parse()?;
        let to: Mailbox = self.settings.to.parse()?;

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(BODY.to_string()));
        if let Some(attachment) = self.attachment()? {
            parts = parts.singlepart(attachment);
        }

        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(format!("Data Report {}", today.format("%Y-%m-%d")))
            .multipart(parts)?)
    }

    fn attachment(&self) -> Result<Option<SinglePart>, NotifyError> {
        let path: &Path = &self.settings.attachment;
        if !path.exists() {
            log::warn!("Attachment not found: {}", path.display());
            return Ok(None);
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rates.zip".to_string());
        let content = std::fs::read(path)?;

        Ok(Some(
            Attachment::new(filename).body(content, ContentType::parse("application/zip")?),
        ))
    }

    pub async fn send_report(&self, today: NaiveDate) -> Result<(), NotifyError> {
        let message = self.build_message(today)?;
        let host = self.smtp_host()?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host)?
            .port(self.settings.smtp_port)
            .credentials(Credentials::new(
                self.settings.from.clone(),
                self.settings.password.clone(),
            ))
            .build();

        log::info!("Sending report to {} via {}", self.settings.to, host);
        mailer.send(message).await?;
        Ok(())
    }

    /// Sends the report once, logging instead of failing. Returns whether
    /// the message was accepted.
    pub async fn notify(&self, today: NaiveDate) -> bool {
        match self.send_report(today).await {
            Ok(()) => {
                log::info!("Email sent successfully");
                true
            }
            Err(e) => {
                log::error!("Error sending email: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings(attachment: PathBuf) -> EmailSettings {
        EmailSettings {
            from: "reports@hotmail.com".to_string(),
            to: "owner@example.com".to_string(),
            password: "secret".to_string(),
            smtp_host: None,
            smtp_port: 587,
            attachment,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn test_smtp_host_for() {
        assert_eq!(smtp_host_for("me@hotmail.com"), Some("smtp.office365.com"));
        assert_eq!(smtp_host_for("me@outlook.com.br"), Some("smtp.office365.com"));
        assert_eq!(smtp_host_for("me@gmail.com"), Some("smtp.gmail.com"));
        assert_eq!(smtp_host_for("me@example.com"), None);
        assert_eq!(smtp_host_for("not-an-address"), None);
    }

    #[test]
    fn test_explicit_smtp_host_wins() {
        let mut s = settings(PathBuf::from("missing.zip"));
        s.smtp_host = Some("mail.example.com".to_string());
        assert_eq!(EmailNotifier::new(s).smtp_host().unwrap(), "mail.example.com");

        let mut s = settings(PathBuf::from("missing.zip"));
        s.from = "reports@example.com".to_string();
        assert!(matches!(
            EmailNotifier::new(s).smtp_host(),
            Err(NotifyError::UnknownSmtpHost(_))
        ));
    }

    #[test]
    fn test_build_message_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.zip");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let message = EmailNotifier::new(settings(path)).build_message(today()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Data Report 2025-03-10"));
        assert!(raw.contains("To: owner@example.com"));
        assert!(raw.contains("Content-Type: application/zip"));
        assert!(raw.contains("filename=\"rates.zip\""));
        assert!(raw.contains(BODY));
    }

    #[test]
    fn test_build_message_without_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let message = EmailNotifier::new(settings(dir.path().join("rates.zip")))
            .build_message(today())
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains(BODY));
        assert!(!raw.contains("application/zip"));
    }

    #[tokio::test]
    async fn test_notify_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path().join("rates.zip"));
        s.from = "a@example.com".to_string();

        assert!(!EmailNotifier::new(s).notify(today()).await);
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let mut s = settings(PathBuf::from("missing.zip"));
        s.to = "not an address".to_string();
        assert!(matches!(
            EmailNotifier::new(s).build_message(today()),
            Err(NotifyError::Address(_))
        ));
    }
}
