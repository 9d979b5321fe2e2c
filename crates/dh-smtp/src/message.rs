//! MIME message builder.
//!
//! Turns an [`OutgoingMail`] into the `multipart/alternative` document
//! written after `354`, and prepares it for the DATA stream.

use base64::Engine;

use crate::types::*;

/// Build the full MIME document for `mail`.
///
/// The boundary is fresh per call so it cannot collide with body content
/// from an earlier message.
pub fn build_message(mail: &OutgoingMail) -> String {
    let boundary = format!("----=_Alt_{}", uuid::Uuid::new_v4().simple());
    build_message_with_boundary(mail, &boundary)
}

pub(crate) fn build_message_with_boundary(mail: &OutgoingMail, boundary: &str) -> String {
    let mut out = String::with_capacity(mail.text_body.len() * 2 + mail.html_body.len() * 2 + 1024);

    // ── Headers ────────────────────────────────────────────
    write_header(&mut out, "Message-ID", &format!("<{}>", mail.message_id));
    write_header(
        &mut out,
        "Date",
        &mail.date.format("%a, %d %b %Y %H:%M:%S %z").to_string(),
    );
    write_header(&mut out, "From", &mail.from.to_mailbox());
    write_header(&mut out, "To", &mail.to.to_mailbox());
    write_header(&mut out, "Subject", &encode_header_value(&single_line(&mail.subject)));
    write_header(&mut out, "MIME-Version", "1.0");
    write_header(
        &mut out,
        "Content-Type",
        &format!("multipart/alternative; boundary=\"{}\"", boundary),
    );
    out.push_str("\r\n");
    out.push_str("This is a multi-part message in MIME format.\r\n");

    // ── Parts ──────────────────────────────────────────────
    write_part(&mut out, boundary, "text/plain", &mail.text_body);
    write_part(&mut out, boundary, "text/html", &mail.html_body);
    out.push_str(&format!("\r\n--{}--\r\n", boundary));
    out
}

fn write_part(out: &mut String, boundary: &str, content_type: &str, body: &str) {
    out.push_str(&format!("\r\n--{}\r\n", boundary));
    write_header(
        out,
        "Content-Type",
        &format!("{}; charset=\"UTF-8\"", content_type),
    );
    write_header(out, "Content-Transfer-Encoding", "quoted-printable");
    out.push_str("\r\n");
    out.push_str(&encode_body(body));
}

fn write_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// Header values must not carry line breaks.
fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// RFC 2047 encode a header value if it contains non-ASCII characters.
pub fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(value.as_bytes());
    format!("=?UTF-8?B?{}?=", encoded)
}

/// Quoted-printable body with CRLF hard line breaks.
pub fn encode_body(text: &str) -> String {
    quoted_printable::encode_to_str(normalize_newlines(text).as_bytes())
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n")
}

/// SMTP dot-stuffing plus the end-of-data marker.
///
/// Every line is CRLF-terminated, lines starting with `.` get a second
/// `.`, and the result ends with `\r\n.\r\n`.
pub fn to_data_payload(document: &str) -> Vec<u8> {
    let mut result = String::with_capacity(document.len() + 64);
    let trimmed = document.strip_suffix("\r\n").unwrap_or(document);
    for line in trimmed.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.starts_with('.') {
            result.push('.');
        }
        result.push_str(line);
        result.push_str("\r\n");
    }
    result.push_str(".\r\n");
    result.into_bytes()
}

// ─── Tests ──────────────────────────────────────────────────────────
