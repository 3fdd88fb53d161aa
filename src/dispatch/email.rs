//! Email formatting and submission: a multipart MIME message with a
//! plain-text alternative and an HTML alternative, the HTML part embedding
//! the rendered map (if any) as a related inline part.
//!
//! Grounded on the teacher's channel-independent, per-step error-isolated
//! posture, and on `examples/original_source/src/modules/mail.py` for the
//! literal template shapes, reimplemented with `lettre`'s typed builders
//! instead of raw string concatenation.

use anyhow::Context;
use lettre::message::{header::ContentType, Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use metrics::counter;
use tracing::{info, warn};

use crate::model::DeliveryRecord;
use crate::Result;

/// SMTP credentials and endpoint for outgoing mail.
#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub recipient: String,
}

/// An email notifier, wrapping an `lettre` SMTP transport.
pub struct EmailDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailDispatcher {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
            .context("could not configure SMTP relay")?
            .port(config.smtp_port)
            .credentials(creds)
            .build();
        Ok(EmailDispatcher { transport, config })
    }

    /// Format and send one delivery record. Errors here are logged by the
    /// caller and never propagate into the cache/lifecycle machinery
    /// (spec.md §7).
    pub async fn send(&self, record: &DeliveryRecord) -> Result<()> {
        let message = build_message(&self.config, record)?;
        self.transport
            .send(message)
            .await
            .context("SMTP submission failed")?;
        counter!("mowasbeacon.dispatch.total", 1, "channel" => "email", "outcome" => "ok");
        info!(identifier = %record.identifier, "email dispatched");
        Ok(())
    }
}

/// Subject line: `MSGTYPE - SEVERITY - <timestamp>` (spec.md §4.7).
pub fn subject_for(record: &DeliveryRecord) -> String {
    format!("{} - {} - {}", record.msgtype, record.severity, record.sent)
}

fn plain_text_body(record: &DeliveryRecord) -> String {
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

    let mut body = String::new();
    body.push_str(headline);
    body.push_str("\n\n");
    body.push_str(description);
    if !instruction.is_empty() {
        body.push_str("\n\n");
        body.push_str(instruction);
    }
    if !contact.is_empty() {
        body.push_str("\n\nContact: ");
        body.push_str(contact);
    }
    body.push_str("\n\nAreas: ");
    body.push_str(
        &record
            .areas
            .iter()
            .map(|a| a.full_name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
    for point in &record.matched_points {
        body.push_str(&format!(
            "\n\n{} ({}, {}) grid {} utm {}{}",
            point.address,
            point.latitude,
            point.longitude,
            point.maidenhead,
            point.utm,
            if point.is_live { " [live]" } else { "" },
        ));
    }
    body
}

fn html_body(record: &DeliveryRecord, has_map: bool) -> String {
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

    let mut html = String::new();
    html.push_str("<html><body>");
    html.push_str(&format!("<h1>{}</h1>", escape(headline)));
    if has_map {
        html.push_str(&format!(
            "<img src=\"cid:map-{}\" alt=\"map\"/>",
            record.identifier
        ));
    }
    html.push_str(&format!("<p>{}</p>", escape(description)));
    if !instruction.is_empty() {
        html.push_str(&format!("<p><strong>Instruction:</strong> {}</p>", escape(instruction)));
    }
    if !contact.is_empty() {
        html.push_str(&format!("<p><strong>Contact:</strong> {}</p>", escape(contact)));
    }
    html.push_str("<table>");
    html.push_str(&format!("<tr><td>Type</td><td>{}</td></tr>", record.msgtype));
    html.push_str(&format!("<tr><td>Severity</td><td>{}</td></tr>", record.severity));
    html.push_str(&format!("<tr><td>Sent</td><td>{}</td></tr>", escape(&record.sent)));
    html.push_str("</table>");
    html.push_str("<ul>");
    for area in &record.areas {
        html.push_str(&format!("<li>{}</li>", escape(&area.full_name)));
    }
    html.push_str("</ul>");
    html.push_str("</body></html>");
    html
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn build_message(config: &EmailConfig, record: &DeliveryRecord) -> Result<Message> {
    let alternative = MultiPart::alternative()
        .singlepart(SinglePart::plain(plain_text_body(record)))
        .singlepart(SinglePart::html(html_body(record, record.rendered_map.is_some())));

    let body = if let Some(map) = &record.rendered_map {
        MultiPart::related().multipart(alternative).singlepart(
            Attachment::new_inline(map.content_id.clone())
                .body(map.png_bytes.clone(), ContentType::parse("image/png")?),
        )
    } else {
        alternative
    };

    let message = Message::builder()
        .from(config.from_address.parse()?)
        .to(config.recipient.parse()?)
        .subject(subject_for(record))
        .multipart(body)
        .context("could not build email message")?;
    Ok(message)
}

/// Logged in place of actually sending, for when no SMTP credentials are
/// configured (`NOT_CONFIGURED`, per spec.md §6).
pub fn log_instead_of_send(record: &DeliveryRecord) {
    warn!(
        identifier = %record.identifier,
        subject = %subject_for(record),
        "email channel not configured; logging instead of sending"
    );
    counter!("mowasbeacon.dispatch.total", 1, "channel" => "email", "outcome" => "not_configured");
}
