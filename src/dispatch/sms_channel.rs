//! Short-message channel: picks a length budget, optionally splits on
//! whitespace boundaries, and hands each physical segment to a
//! [`NotifierSink`] as its own message (spec.md §4.7).

use crate::enrich::sms;
use crate::model::DeliveryRecord;

use super::notifier::{dispatch, NotifierMessage, NotifierSink, NotifierUrgency};

/// Build the source text for an SMS-style message: prefer the translated
/// `sms_message` mirror when one was produced (spec.md §4.6 step 5), then
/// the abbreviated form produced by the summarizer, falling back to the
/// full description.
fn source_text(record: &DeliveryRecord) -> String {
    let translations = record.translations.as_ref();
    let headline = translations
        .and_then(|t| t.headline.as_deref())
        .unwrap_or(&record.headline);
    if let Some(sms_message) = translations.and_then(|t| t.sms_message.as_deref()) {
        return format!("{}: {}", headline, sms_message);
    }
    format!(
        "{}: {}",
        headline,
        record
            .abbreviated_text
            .as_deref()
            .unwrap_or(&record.description)
    )
}

/// Format and dispatch `record` to `sink` as one or more SMS-length
/// segments.
///
/// `max_len` is the configured `--sms-message-length` (clamped internally
/// to [`sms::MIN_MESSAGE_LENGTH`]); `split` mirrors `--sms-message-split`.
pub async fn dispatch_sms(
    sink: &dyn NotifierSink,
    record: &DeliveryRecord,
    max_len: usize,
    split: bool,
) {
    let text = source_text(record);
    let urgency = if record.priority_high {
        NotifierUrgency::High
    } else {
        NotifierUrgency::Normal
    };

    let segments = if split {
        sms::segment(&text, max_len)
    } else {
        vec![sms::truncate(&text, max_len)]
    };

    for segment_text in segments {
        let message = NotifierMessage {
            identifier: record.identifier.clone(),
            text: segment_text,
            urgency,
        };
        dispatch(sink, &message).await;
    }
}
