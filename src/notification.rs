//! Outbound notifications for alerts and reminders.
//!
//! Delivery is best-effort. Callers go through [`notify_alert`] or
//! [`send_or_log`], which log a failed send and move on.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::db::DbAlert;

const SLACK_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected message: HTTP {status} - {body}")]
    Rejected { status: u16, body: String },

    #[error("{failed} of {total} notifiers failed")]
    Partial { failed: usize, total: usize },
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub recipient_email: Option<String>,
}

pub trait Notifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no channel is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        log::info!(
            "[{}] to {}: {}",
            notification.subject,
            notification.recipient_email.as_deref().unwrap_or("<nobody>"),
            notification.body
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

/// Posts to a Slack incoming webhook.
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SLACK_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

impl Notifier for SlackNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let text = slack_text(notification);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&SlackPayload { text: &text })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

fn slack_text(notification: &Notification) -> String {
    format!("*{}*\n{}", notification.subject, notification.body)
}

/// Sends to every inner notifier, even after one fails.
#[derive(Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut failed = 0;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.send(notification) {
                log::warn!("Notifier failed for '{}': {}", notification.subject, e);
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(NotifyError::Partial {
                failed,
                total: self.notifiers.len(),
            });
        }
        Ok(())
    }
}

/// Build the notifier the configuration asks for.
///
/// Alerts are always logged. A Slack webhook, when configured, is added on
/// top. A webhook client that fails to build is logged and skipped.
pub fn build_notifier(config: &Config) -> Box<dyn Notifier> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
    notifiers.push(Box::new(LogNotifier));

    if let Some(url) = config.notifications.slack_webhook_url.as_deref() {
        match SlackNotifier::new(url) {
            Ok(slack) => notifiers.push(Box::new(slack)),
            Err(e) => log::warn!("Slack notifier disabled: {}", e),
        }
    }

    let fanout = FanoutNotifier::new(notifiers);
    log::debug!("Notifications fan out to {} channel(s)", fanout.len());
    Box::new(fanout)
}

/// Deliver a notification, logging instead of propagating a failure.
pub fn send_or_log(notifier: &dyn Notifier, notification: &Notification) -> bool {
    match notifier.send(notification) {
        Ok(()) => true,
        Err(e) => {
            log::warn!(
                "Failed to deliver '{}' to {}: {}",
                notification.subject,
                notification.recipient_email.as_deref().unwrap_or("<nobody>"),
                e
            );
            false
        }
    }
}

/// Dispatch one alert to its recipient. Best-effort.
pub fn notify_alert(notifier: &dyn Notifier, alert: &DbAlert, recipient_email: Option<&str>) -> bool {
    let notification = Notification {
        subject: "Meeting Alert".to_string(),
        body: alert.message.clone(),
        recipient_email: recipient_email.map(String::from),
    };
    send_or_log(notifier, &notification)
}
