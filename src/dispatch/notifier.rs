//! The pluggable notifier sink contract for chat/SMS-style destinations.
//!
//! Grounded on the teacher's `<dyn KeyValueStore>::new_from_url` registry
//! pattern: a trait contract plus a trivial structured-logging default and
//! a concrete webhook-based implementation.

use async_trait::async_trait;
use metrics::{counter, describe_counter};
use tracing::{info, warn};

use crate::Result;

fn describe_metrics() {
    describe_counter!(
        "mowasbeacon.dispatch.total",
        "Dispatch attempts, labeled by channel and outcome"
    );
}

/// An urgency hint derived from a delivery record's `priority_high` flag,
/// for notifier backends that support message priority.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotifierUrgency {
    Normal,
    High,
}

/// One outgoing message for a chat/SMS-style sink.
#[derive(Clone, Debug)]
pub struct NotifierMessage {
    pub identifier: String,
    pub text: String,
    pub urgency: NotifierUrgency,
}

/// A pluggable notifier sink (chat, SMS gateway, pager, ...).
///
/// Implementations should treat transport failures as non-fatal: the
/// dispatcher logs them and moves on to the next channel (spec.md §4.7,
/// §7).
#[async_trait]
pub trait NotifierSink: Send + Sync {
    /// A short name for this sink, used in logs and metrics labels.
    fn name(&self) -> &str;

    async fn send(&self, message: &NotifierMessage) -> Result<()>;
}

/// Send one message through `sink`, logging and counting the outcome but
/// never propagating the error (per spec.md §7: a dispatch failure must not
/// block other channels or re-run the lifecycle decision).
pub async fn dispatch(sink: &dyn NotifierSink, message: &NotifierMessage) {
    describe_metrics();
    match sink.send(message).await {
        Ok(()) => {
            info!(channel = sink.name(), identifier = %message.identifier, "dispatched");
            counter!("mowasbeacon.dispatch.total", 1, "channel" => sink.name().to_owned(), "outcome" => "ok");
        }
        Err(err) => {
            warn!(channel = sink.name(), identifier = %message.identifier, error = %err, "dispatch failed");
            counter!("mowasbeacon.dispatch.total", 1, "channel" => sink.name().to_owned(), "outcome" => "error");
        }
    }
}

/// Logs every message instead of sending it anywhere. The trivial default
/// implementation, matching the "Logging" backend that
/// `opinionated_metrics` itself falls back to when no remote reporter is
/// configured.
pub struct LoggingSink {
    name: String,
}

impl LoggingSink {
    pub fn new(name: impl Into<String>) -> Self {
        LoggingSink { name: name.into() }
    }
}

#[async_trait]
impl NotifierSink for LoggingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &NotifierMessage) -> Result<()> {
        info!(
            sink = %self.name,
            identifier = %message.identifier,
            urgency = ?message.urgency,
            text = %message.text,
            "notifier message (logging sink)"
        );
        Ok(())
    }
}

/// Posts each message as a JSON payload to a configured webhook URL. The
/// concrete example of a real chat/SMS-style transport.
pub struct WebhookSink {
    name: String,
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(name: impl Into<String>, http: reqwest::Client, url: impl Into<String>) -> Self {
        WebhookSink {
            name: name.into(),
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotifierSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &NotifierMessage) -> Result<()> {
        #[derive(serde::Serialize)]
        struct Payload<'a> {
            identifier: &'a str,
            text: &'a str,
            high_priority: bool,
        }
        self.http
            .post(&self.url)
            .json(&Payload {
                identifier: &message.identifier,
                text: &message.text,
                high_priority: message.urgency == NotifierUrgency::High,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
