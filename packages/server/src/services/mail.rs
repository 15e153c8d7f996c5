//! Outbound email notifications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("mail relay returned {0}")]
    Status(u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Logs messages instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Mail disabled; notification not sent");
        Ok(())
    }
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct HttpMailer {
    endpoint: String,
    api_key: String,
    from: String,
    http: Client,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            http,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&RelayMessage {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.body,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(MailError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Outcome of an admin review, for the notification text.
#[derive(Clone, Debug)]
pub enum Decision {
    Approved { points: i32 },
    Rejected { reason: Option<String> },
}

pub fn decision_email(to: &str, student_name: &str, title: &str, decision: &Decision) -> Email {
    let (subject, body) = match decision {
        Decision::Approved { points } => (
            format!("Achievement approved: {title}"),
            format!(
                "Hi {student_name},\n\nYour achievement \"{title}\" has been approved \
                 and {points} points were added to your total.\n"
            ),
        ),
        Decision::Rejected { reason } => (
            format!("Achievement rejected: {title}"),
            format!(
                "Hi {student_name},\n\nYour achievement \"{title}\" was not approved.\n{}",
                reason
                    .as_deref()
                    .map(|r| format!("Reason: {r}\n"))
                    .unwrap_or_default()
            ),
        ),
    };
    Email {
        to: to.to_string(),
        subject,
        body,
    }
}

/// Send in the background. Failures are logged and never reach the caller.
pub fn spawn_send(mailer: Arc<dyn Mailer>, email: Email) {
    tokio::spawn(async move {
        let to = email.to.clone();
        if let Err(e) = mailer.send(email).await {
            warn!(to = %to, error = %e, "Failed to send notification email");
        }
    });
}
