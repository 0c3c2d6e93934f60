//! MIME assembly of the invitation mail.

use chrono::Utc;
use uuid::Uuid;

use super::invite::Invite;
use crate::{
    errors::ScheduleError,
    models::{EventTime, PendingEvent},
    views,
};

const CRLF: &str = "\r\n";
/// Recommended header line length (RFC 5322 2.1.1); the hard limit is 998.
const FOLD_AT: usize = 78;
/// Encoded-word payload budget: 75 minus `=?UTF-8?Q?` and `?=`.
const ENCODED_WORD_PAYLOAD: usize = 63;

/// An assembled invitation, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub from: String,
    pub reply_to: String,
    pub to: Vec<String>,
    pub subject: String,
    pub message_id: String,
    pub date: String,
    pub text_body: String,
    pub html_body: String,
    pub invite: Invite,
    boundary: String,
}

pub fn build_email(
    pending: &PendingEvent,
    time: &EventTime,
    invite: Invite,
    from: &str,
) -> Result<Message, ScheduleError> {
    let organizer = pending.organizer()?;
    if let Some(bad) = pending.attendees.iter().find(|a| a.email.chars().any(char::is_control)) {
        return Err(ScheduleError::bad_request(format!(
            "attendee email {:?} contains control characters",
            bad.email
        )));
    }
    let domain = from.rsplit('@').next().unwrap_or("localhost").trim_end_matches('>');

    Ok(Message {
        from: from.to_string(),
        reply_to: organizer.email.clone(),
        to: pending.recipients(),
        subject: format!("Invitation: {}", pending.event.title),
        message_id: format!("<{}@{}>", invite.uid.replace(['/', '@'], "."), domain),
        date: Utc::now().to_rfc2822(),
        text_body: views::email_text(pending, time),
        html_body: views::email_html(pending, time),
        invite,
        boundary: Uuid::new_v4().simple().to_string(),
    })
}

impl Message {
    pub fn to_header(&self) -> String {
        self.to.join(", ")
    }

    /// Serializes to a `multipart/mixed` document: the text, HTML and inline
    /// `text/calendar; method=REQUEST` alternatives, then `event.ics` as an attachment.
    pub fn to_mime(&self) -> String {
        let mixed = format!("mixed-{}", self.boundary);
        let alternative = format!("alt-{}", self.boundary);
        let mut out = String::new();

        header(&mut out, "MIME-Version", "1.0");
        header(&mut out, "Date", &self.date);
        header(&mut out, "Message-ID", &self.message_id);
        header(&mut out, "From", &self.from);
        header(&mut out, "Reply-To", &self.reply_to);
        header(&mut out, "To", &fold_addresses("To", &self.to));
        header(&mut out, "Subject", &encode_header(&self.subject));
        header(&mut out, "Content-Type", &format!("multipart/mixed; boundary=\"{mixed}\""));
        out.push_str(CRLF);

        open_part(&mut out, &mixed);
        header(&mut out, "Content-Type", &format!("multipart/alternative; boundary=\"{alternative}\""));
        out.push_str(CRLF);

        open_part(&mut out, &alternative);
        text_part(&mut out, "text/plain; charset=utf-8", None, &self.text_body);
        open_part(&mut out, &alternative);
        text_part(&mut out, "text/html; charset=utf-8", None, &self.html_body);
        open_part(&mut out, &alternative);
        text_part(&mut out, "text/calendar; charset=utf-8; method=REQUEST", None, &self.invite.ics);
        close_parts(&mut out, &alternative);

        open_part(&mut out, &mixed);
        text_part(
            &mut out,
            "application/ics; name=\"event.ics\"",
            Some("attachment; filename=\"event.ics\""),
            &self.invite.ics,
        );
        close_parts(&mut out, &mixed);
        out
    }
}

fn header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str(CRLF);
}

fn open_part(out: &mut String, boundary: &str) {
    out.push_str("--");
    out.push_str(boundary);
    out.push_str(CRLF);
}

fn close_parts(out: &mut String, boundary: &str) {
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("--");
    out.push_str(CRLF);
}

fn text_part(out: &mut String, content_type: &str, disposition: Option<&str>, body: &str) {
    header(out, "Content-Type", content_type);
    header(out, "Content-Transfer-Encoding", "8bit");
    if let Some(disposition) = disposition {
        header(out, "Content-Disposition", disposition);
    }
    out.push_str(CRLF);
    for line in body.lines() {
        out.push_str(line);
        out.push_str(CRLF);
    }
}

/// Joins addresses with `, `, folding onto continuation lines before `FOLD_AT`.
fn fold_addresses(name: &str, addresses: &[String]) -> String {
    let mut folded = String::new();
    let mut line_len = name.len() + 2;
    for (i, address) in addresses.iter().enumerate() {
        if i > 0 {
            folded.push(',');
            line_len += 1;
            if line_len + 1 + address.len() > FOLD_AT {
                folded.push_str(CRLF);
                folded.push(' ');
                line_len = 1;
            } else {
                folded.push(' ');
                line_len += 1;
            }
        }
        folded.push_str(address);
        line_len += address.len();
    }
    folded
}

/// RFC 2047 Q-encoding for header values that are not plain printable ASCII.
/// Long values become several encoded words on folded lines.
fn encode_header(value: &str) -> String {
    if value.is_ascii() && !value.chars().any(char::is_control) {
        return value.to_string();
    }
    let mut words = Vec::new();
    let mut word = String::new();
    let mut buf = [0u8; 4];
    for c in value.chars() {
        let mut token = String::new();
        for byte in c.encode_utf8(&mut buf).bytes() {
            match byte {
                b' ' => token.push('_'),
                b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                    token.push(byte as char)
                }
                other => token.push_str(&format!("={other:02X}")),
            }
        }
        if word.len() + token.len() > ENCODED_WORD_PAYLOAD {
            words.push(std::mem::take(&mut word));
        }
        word.push_str(&token);
    }
    words.push(word);
    words
        .iter()
        .map(|w| format!("=?UTF-8?Q?{w}?="))
        .collect::<Vec<_>>()
        .join("\r\n ")
}
