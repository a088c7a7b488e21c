//! Pushover notification dispatch and message formatting.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::ledger::{DiscoveryRecord, DiscoveryState};
use crate::types::{ProductInfo, SearchTerm, Target};
use crate::util::truncate_str;

/// Pushover messages API endpoint.
pub const PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";

/// Display-text cap inside a notification body.
pub const NOTIFICATION_TEXT_LIMIT: usize = 150;

/// Errors that can occur while dispatching a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
}

/// Configuration for the notifier
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub token: String,
    pub user: String,
    /// Title used when a dispatch does not provide its own.
    pub default_title: String,
    pub priority: i8,
    pub sound: String,
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            user: String::new(),
            default_title: "Content Found!".to_string(),
            priority: 1,
            sound: "magic".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Notification delivery boundary. Production wraps Pushover; tests record.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. A non-200 provider response is a failure.
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError>;
}

/// Pushover-backed notification sink
pub struct PushoverNotifier {
    client: reqwest::Client,
    config: NotifyConfig,
}

impl PushoverNotifier {
    pub fn new(config: NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationSink for PushoverNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        let title = if title.is_empty() {
            self.config.default_title.as_str()
        } else {
            title
        };
        let priority = self.config.priority.to_string();
        let params = [
            ("token", self.config.token.as_str()),
            ("user", self.config.user.as_str()),
            ("title", title),
            ("message", message),
            ("priority", priority.as_str()),
            ("sound", self.config.sound.as_str()),
        ];

        let response = self.client.post(PUSHOVER_ENDPOINT).form(&params).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!(status = status.as_u16(), "notification dispatch rejected");
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::info!(title, "notification sent");
        Ok(())
    }
}

/// Format the notification for one discovery. The detail record is optional;
/// without one the message still names the term and the site.
pub fn discovery_message(
    target: &Target,
    term: &SearchTerm,
    detail: Option<&ProductInfo>,
) -> (String, String) {
    let title = format!("Found: {}", term.raw());

    let mut body = format!("'{}' FOUND!\n\nSite: {}\n\n", term.raw(), target);
    if let Some(detail) = detail {
        let _ = writeln!(body, "Type: {}", detail.kind);
        let _ = writeln!(body, "Text: {}", truncate_str(&detail.text, NOTIFICATION_TEXT_LIMIT));
        if let Some(url) = &detail.url {
            let _ = writeln!(body, "Link: {}", url);
        }
        if let Some(price) = &detail.price {
            let _ = writeln!(body, "Price: {}", price);
        }
    }
    let _ = write!(body, "\nCheck immediately: {}", target);

    (title, body)
}

/// Startup announcement enumerating what is being watched.
pub fn startup_message(
    targets: &[Target],
    terms: &[SearchTerm],
    interval: Duration,
) -> (String, String) {
    let title = "Site Monitor Started".to_string();

    let mut body = String::from("Site monitor started successfully!\n\n");
    let _ = writeln!(body, "Monitoring {} URL(s):", targets.len());
    for target in targets {
        let _ = writeln!(body, "- {}", target);
    }
    let _ = writeln!(body, "\nSearching for {} term(s):", terms.len());
    for term in terms {
        let _ = writeln!(body, "- {}", term);
    }
    let _ = writeln!(body, "\nCheck interval: {} minutes", interval.as_secs() / 60);
    let _ = write!(
        body,
        "Total combinations to find: {}",
        targets.len() * terms.len()
    );

    (title, body)
}

/// Mission-complete summary enumerating every pair's final state.
pub fn completion_message(records: &[DiscoveryRecord]) -> (String, String) {
    let title = "Mission Complete - All Items Found!".to_string();

    let mut body = String::from("Site monitor has completed its mission successfully!\n\n");
    let _ = writeln!(
        body,
        "All {} search combinations have been found:\n",
        records.len()
    );

    let mut current_target: Option<&Target> = None;
    for record in records {
        if current_target != Some(&record.target) {
            if current_target.is_some() {
                body.push('\n');
            }
            let _ = writeln!(body, "Site: {}:", record.target);
            current_target = Some(&record.target);
        }
        match (record.state, record.found_at) {
            (DiscoveryState::NotFound, _) | (_, None) => {
                let _ = writeln!(body, "  [NOT FOUND] {}", record.term);
            }
            (_, Some(at)) => {
                let _ = writeln!(
                    body,
                    "  [FOUND] {} (found at {})",
                    record.term,
                    at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    let _ = write!(body, "\nThe monitor will now stop to avoid spam notifications.");

    (title, body)
}
