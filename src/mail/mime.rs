//! MIME message building.
//!
//! Produces a `multipart/mixed` message: an alternative part with a plain
//! fallback and the inline HTML, followed by the full report attachment.

use super::{OutgoingMail, PLAIN_FALLBACK};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use chrono::Utc;

const LINE_WIDTH: usize = 76;
const CRLF: &str = "\r\n";

/// A boundary unlikely to appear in base64 bodies.
pub fn new_boundary(tag: &str) -> String {
    format!(
        "=_formguide_{}_{}",
        tag,
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

/// RFC 2047 encode a header value when it is not plain ASCII.
pub fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Base64 body wrapped at 76 columns.
fn encode_body(content: &str) -> String {
    let encoded = STANDARD.encode(content.as_bytes());
    encoded
        .as_bytes()
        .chunks(LINE_WIDTH)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join(CRLF)
}

fn push_part(message: &mut String, boundary: &str, headers: &[String], body: &str) {
    message.push_str(&format!("--{boundary}{CRLF}"));
    for header in headers {
        message.push_str(header);
        message.push_str(CRLF);
    }
    message.push_str("Content-Transfer-Encoding: base64");
    message.push_str(CRLF);
    message.push_str(CRLF);
    message.push_str(&encode_body(body));
    message.push_str(CRLF);
}

/// Assemble the full RFC 5322 message.
pub fn build_message(mail: &OutgoingMail, mixed: &str, alternative: &str) -> String {
    let mut message = String::new();

    message.push_str(&format!("To: {}{CRLF}", mail.recipients.join(", ")));
    message.push_str(&format!("Subject: {}{CRLF}", encode_header(&mail.subject)));
    message.push_str(&format!("MIME-Version: 1.0{CRLF}"));
    message.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{mixed}\"{CRLF}{CRLF}"
    ));

    message.push_str(&format!("--{mixed}{CRLF}"));
    message.push_str(&format!(
        "Content-Type: multipart/alternative; boundary=\"{alternative}\"{CRLF}{CRLF}"
    ));
    push_part(
        &mut message,
        alternative,
        &["Content-Type: text/plain; charset=\"utf-8\"".to_string()],
        PLAIN_FALLBACK,
    );
    push_part(
        &mut message,
        alternative,
        &["Content-Type: text/html; charset=\"utf-8\"".to_string()],
        &mail.inline_html_body,
    );
    message.push_str(&format!("--{alternative}--{CRLF}"));

    let filename = encode_header(&mail.attachment_filename);
    push_part(
        &mut message,
        mixed,
        &[
            format!("Content-Type: text/html; charset=\"utf-8\"; name=\"{filename}\""),
            format!("Content-Disposition: attachment; filename=\"{filename}\""),
        ],
        &mail.attachment_html,
    );
    message.push_str(&format!("--{mixed}--{CRLF}"));

    message
}

/// Encode a message for the Gmail API `raw` field.
pub fn encode_raw(message: &str) -> String {
    URL_SAFE.encode(message.as_bytes())
}
