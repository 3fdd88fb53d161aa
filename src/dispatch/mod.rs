//! Fan-out dispatch: one [`crate::model::DeliveryRecord`] goes to every
//! configured channel independently, so a failure or missing configuration
//! on one channel never blocks the others.
//!
//! Grounded on the teacher's multi-sink registry (`key_value_stores/mod.rs`)
//! and on its convention of treating each output as independently fallible.

pub mod email;
pub mod fullcontent;
pub mod notifier;
pub mod sms_channel;

use tracing::instrument;

use crate::model::DeliveryRecord;
use email::EmailDispatcher;
use notifier::NotifierSink;

/// Aggregates every configured output channel and drives one delivery
/// record through each of them.
pub struct Dispatcher {
    email: Option<EmailDispatcher>,
    full_content_sink: Option<Box<dyn NotifierSink>>,
    sms_sink: Option<Box<dyn NotifierSink>>,
    sms_max_len: usize,
    sms_split: bool,
}

impl Dispatcher {
    pub fn new(
        email: Option<EmailDispatcher>,
        full_content_sink: Option<Box<dyn NotifierSink>>,
        sms_sink: Option<Box<dyn NotifierSink>>,
        sms_max_len: usize,
        sms_split: bool,
    ) -> Self {
        Dispatcher {
            email,
            full_content_sink,
            sms_sink,
            sms_max_len: sms_max_len.max(crate::enrich::sms::MIN_MESSAGE_LENGTH),
            sms_split,
        }
    }

    /// Drive `record` through every configured channel. Each channel's
    /// failure is isolated by the channel itself (`EmailDispatcher::send`
    /// logs and counts; `notifier::dispatch` logs and counts); this method
    /// never returns an error to its caller.
    #[instrument(skip(self, record), fields(identifier = %record.identifier))]
    pub async fn dispatch(&self, record: &DeliveryRecord) {
        match &self.email {
            Some(dispatcher) => {
                if let Err(err) = dispatcher.send(record).await {
                    tracing::warn!(error = %err, "email dispatch failed");
                }
            }
            None => email::log_instead_of_send(record),
        }

        if let Some(sink) = &self.full_content_sink {
            let text = fullcontent::format_full_content(record);
            let message = notifier::NotifierMessage {
                identifier: record.identifier.clone(),
                text,
                urgency: if record.priority_high {
                    notifier::NotifierUrgency::High
                } else {
                    notifier::NotifierUrgency::Normal
                },
            };
            notifier::dispatch(sink.as_ref(), &message).await;
        }

        if let Some(sink) = &self.sms_sink {
            sms_channel::dispatch_sms(sink.as_ref(), record, self.sms_max_len, self.sms_split).await;
        }
    }
}

pub use email::EmailConfig as EmailChannelConfig;
