//! Email notifications. Delivery is best effort: a failed send is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email service returned {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ApplicationReceived {
        application_id: Uuid,
        to: String,
        applicant_name: String,
        job_title: String,
        company_name: String,
    },
    InterviewInvitation {
        application_id: Uuid,
        to: String,
        applicant_name: String,
        job_title: String,
        company_name: String,
    },
}

/// Wire body posted to the email webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailRequest<'a> {
    template: &'static str,
    to: &'a str,
    subject: String,
    application_id: Uuid,
    applicant_name: &'a str,
    job_title: &'a str,
    company_name: &'a str,
}

impl Notification {
    pub fn application_id(&self) -> Uuid {
        match self {
            Notification::ApplicationReceived { application_id, .. }
            | Notification::InterviewInvitation { application_id, .. } => *application_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::ApplicationReceived { .. } => "application_received",
            Notification::InterviewInvitation { .. } => "interview_invitation",
        }
    }

    fn email(&self) -> EmailRequest<'_> {
        match self {
            Notification::ApplicationReceived {
                application_id,
                to,
                applicant_name,
                job_title,
                company_name,
            } => EmailRequest {
                template: self.kind(),
                to,
                subject: format!("Application received: {job_title} at {company_name}"),
                application_id: *application_id,
                applicant_name,
                job_title,
                company_name,
            },
            Notification::InterviewInvitation {
                application_id,
                to,
                applicant_name,
                job_title,
                company_name,
            } => EmailRequest {
                template: self.kind(),
                to,
                subject: format!("Interview invitation: {job_title} at {company_name}"),
                application_id: *application_id,
                applicant_name,
                job_title,
                company_name,
            },
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&notification.email())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no email webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let email = notification.email();
        info!(
            application_id = %email.application_id,
            to = email.to,
            template = email.template,
            "Email not sent (no webhook configured): {}",
            email.subject
        );
        Ok(())
    }
}

/// Sends on a detached task. The caller never waits and never sees the outcome.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            warn!(
                application_id = %notification.application_id(),
                kind = notification.kind(),
                "Notification failed: {e}"
            );
        }
    });
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn count(&self, kind: &str) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.kind() == kind)
                .count()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail {
                return Err(NotifyError::Rejected(502));
            }
            Ok(())
        }
    }
}
