//! Full-content notifier formatting: headline, a details table, and a
//! per-matched-point block, for chat-style destinations that can render
//! long messages (spec.md §4.7's "Telegram-style full HTML block").
//!
//! Grounded on `examples/original_source/src/modules/outputgenerator.py`'s
//! section ordering, reimplemented as a typed builder.

use crate::model::DeliveryRecord;

/// Render `record` as an HTML-ish message body for a full-content notifier
/// sink (e.g. a Telegram bot, which accepts a restricted HTML subset).
pub fn format_full_content(record: &DeliveryRecord) -> String {
    let translations = record.translations.as_ref();
    let headline = translations
        .and_then(|t| t.headline.as_deref())
        .unwrap_or(&record.headline);
    let description = translations
        .and_then(|t| t.description.as_deref())
        .unwrap_or(&record.description);
    let instruction = translations
        .and_then(|t| t.instruction.as_deref())
        .unwrap_or(&record.instruction);
    let contact = translations
        .and_then(|t| t.contact.as_deref())
        .unwrap_or(&record.contact);

    let mut out = String::new();
    out.push_str(&format!("<b>{}</b>\n\n", headline));

    out.push_str(&format!(
        "Type: {}\nUrgency: {}\nSeverity: {}\nSent: {}\n\n",
        record.msgtype, record.urgency, record.severity, record.sent
    ));

    if !description.is_empty() {
        out.push_str(description);
        out.push_str("\n\n");
    }
    if !instruction.is_empty() {
        out.push_str(&format!("<b>Instruction:</b> {}\n\n", instruction));
    }
    if !contact.is_empty() {
        out.push_str(&format!("<b>Contact:</b> {}\n\n", contact));
    }

    if !record.areas.is_empty() {
        out.push_str("<b>Areas:</b>\n");
        for area in &record.areas {
            out.push_str(&format!("- {}\n", area.abbreviated_name));
        }
        out.push('\n');
    }

    for point in &record.matched_points {
        out.push_str(&format!(
            "{}lat/lon: {:.4}, {:.4}\nUTM: {}\nGrid: {}\nAddress: {}\n\n",
            if point.is_live { "[live] " } else { "" },
            point.latitude,
            point.longitude,
            point.utm,
            point.maidenhead,
            point.address,
        ));
    }

    out.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchedArea, MatchedPoint, MsgType, Severity};

    fn record() -> DeliveryRecord {
        DeliveryRecord {
            identifier: "DE-1".to_owned(),
            headline: "Flood warning".to_owned(),
            description: "Water rising".to_owned(),
            instruction: String::new(),
            contact: String::new(),
            severity: Severity::Severe,
            urgency: "Immediate".to_owned(),
            sent: "2020-08-28T11:00:08+02:00".to_owned(),
            msgtype: MsgType::Alert,
            priority_high: true,
            areas: vec![MatchedArea {
                full_name: "Gemeinde/Stadt: Musterhausen".to_owned(),
                abbreviated_name: "Musterhausen".to_owned(),
            }],
            geocodes: vec![],
            polygon: vec![],
            matched_points: vec![MatchedPoint {
                latitude: 48.0,
                longitude: 10.0,
                address: "Musterhausen, Germany".to_owned(),
                maidenhead: "JN48oe".to_owned(),
                utm: "32U 1234 5678".to_owned(),
                is_live: true,
            }],
            rendered_map: None,
            translations: None,
            abbreviated_text: None,
        }
    }

    #[test]
    fn includes_headline_and_details_table() {
        let out = format_full_content(&record());
        assert!(out.contains("Flood warning"));
        assert!(out.contains("Type: Alert"));
        assert!(out.contains("Severity: Severe"));
    }

    #[test]
    fn marks_the_live_point() {
        let out = format_full_content(&record());
        assert!(out.contains("[live]"));
        assert!(out.contains("Musterhausen, Germany"));
    }

    #[test]
    fn omits_empty_optional_sections() {
        let out = format_full_content(&record());
        assert!(!out.contains("Instruction:"));
        assert!(!out.contains("Contact:"));
    }

    #[test]
    fn prefers_translated_text_when_present() {
        use crate::model::Translations;
        let mut r = record();
        r.translations = Some(Translations {
            headline: Some("Avertissement d'inondation".to_owned()),
            description: Some("L'eau monte".to_owned()),
            instruction: None,
            contact: None,
            sms_message: None,
        });
        let out = format_full_content(&r);
        assert!(out.contains("Avertissement d'inondation"));
        assert!(out.contains("L'eau monte"));
        assert!(!out.contains("Flood warning"));
        assert!(!out.contains("Water rising"));
    }
}
