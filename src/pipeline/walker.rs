//! MIME payload walking: classify a raw message's parts into bodies,
//! inline images, and attachments.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::warn;

use crate::model::message::{Message, MessageMeta, Part, PartKind};

/// Parse a raw message and flatten its MIME tree.
///
/// The tree is traversed depth-first in document order. At most one
/// plain-text and one HTML body survive; in nested multipart/alternative
/// trees the later (deeper) candidate replaces the earlier one. Every
/// other leaf lands in `parts`. Undecodable leaves are kept with a
/// `data: None` marker instead of failing the message.
pub fn walk_message(id: &str, raw: &[u8]) -> Message {
    let parser = MessageParser::default();
    let Some(parsed) = parser.parse(raw) else {
        warn!(id, "message failed MIME parsing, using fallback extraction");
        return fallback_message(id, raw);
    };

    let meta = extract_meta(id, &parsed);

    let mut state = WalkState::default();
    walk_part(&parsed, 0, &mut state);

    Message {
        meta,
        body_plain: state.body_plain,
        body_html: state.body_html,
        parts: state.parts,
    }
}

#[derive(Default)]
struct WalkState {
    body_plain: Option<String>,
    body_html: Option<String>,
    parts: Vec<Part>,
}

fn walk_part(msg: &mail_parser::Message<'_>, part_id: usize, state: &mut WalkState) {
    let Some(part) = msg.parts.get(part_id) else {
        return;
    };

    match &part.body {
        PartType::Multipart(children) => {
            for &child in children {
                walk_part(msg, child, state);
            }
        }
        PartType::Text(text) => {
            if is_attached(part) {
                state.parts.push(leaf_part(part, PartKind::Attachment));
            } else {
                state.body_plain = Some(text.to_string());
            }
        }
        PartType::Html(html) => {
            if is_attached(part) {
                state.parts.push(leaf_part(part, PartKind::Attachment));
            } else {
                state.body_html = Some(html.to_string());
            }
        }
        PartType::Binary(_) | PartType::InlineBinary(_) => {
            let kind = if is_inline_image(part) {
                PartKind::InlineImage
            } else {
                PartKind::Attachment
            };
            state.parts.push(leaf_part(part, kind));
        }
        PartType::Message(_) => {
            // Nested message/rfc822: archived as an attachment.
            state.parts.push(leaf_part(part, PartKind::Attachment));
        }
    }
}

/// A text/html leaf that is really an attached file rather than a body.
fn is_attached(part: &mail_parser::MessagePart<'_>) -> bool {
    disposition(part).as_deref() == Some("attachment") || part.attachment_name().is_some()
}

/// Inline image: declares a content-id, an image media type, and is not
/// explicitly marked as an attachment.
fn is_inline_image(part: &mail_parser::MessagePart<'_>) -> bool {
    part.content_id().is_some()
        && media_type(part).starts_with("image/")
        && disposition(part).as_deref() != Some("attachment")
}

fn disposition(part: &mail_parser::MessagePart<'_>) -> Option<String> {
    part.content_disposition().map(|d| d.ctype().to_lowercase())
}

fn media_type(part: &mail_parser::MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub).to_lowercase(),
            None => ct.ctype().to_lowercase(),
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn leaf_part(part: &mail_parser::MessagePart<'_>, kind: PartKind) -> Part {
    let contents = part.contents();
    let data = if part.is_encoding_problem {
        None
    } else {
        Some(contents.to_vec())
    };

    Part {
        kind,
        content_type: media_type(part),
        content_id: part
            .content_id()
            .map(|cid| cid.trim_matches(['<', '>']).to_string()),
        filename: part.attachment_name().map(String::from),
        size: contents.len() as u64,
        data,
    }
}

fn extract_meta(id: &str, msg: &mail_parser::Message<'_>) -> MessageMeta {
    let subject = msg.subject().unwrap_or_default().to_string();
    let from = msg.from().map(format_address_list).unwrap_or_default();
    let to = msg.to().map(format_address_list).unwrap_or_default();
    let cc = msg
        .cc()
        .map(format_address_list)
        .filter(|s| !s.is_empty());

    let date_raw = raw_header(msg, "date").unwrap_or_default();
    let date = parse_date(&date_raw).or_else(|| {
        msg.date().and_then(|dt| {
            Utc.timestamp_opt(dt.to_timestamp(), 0)
                .single()
                .map(|utc| utc.fixed_offset())
        })
    });

    MessageMeta {
        id: id.to_string(),
        subject,
        from,
        to,
        cc,
        date_raw,
        date,
    }
}

fn format_address_list(addr: &mail_parser::Address<'_>) -> String {
    addr.iter()
        .map(|a| match (a.name(), a.address()) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (Some(name), None) => name.to_string(),
            (None, Some(email)) => email.to_string(),
            (None, None) => String::new(),
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The raw (undecoded) value of a top-level header, trimmed.
fn raw_header(msg: &mail_parser::Message<'_>, name: &str) -> Option<String> {
    let root = msg.parts.first()?;
    for header in &root.headers {
        if header.name.as_str().eq_ignore_ascii_case(name) {
            let raw = msg.raw_message.get(header.offset_start..header.offset_end)?;
            return Some(String::from_utf8_lossy(raw).trim().to_string());
        }
    }
    None
}

/// Parse an RFC 2822 `Date:` value, tolerating a trailing comment like
/// `(UTC)`.
fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_comment = match trimmed.find('(') {
        Some(pos) => trimmed[..pos].trim(),
        None => trimmed,
    };
    DateTime::parse_from_rfc2822(without_comment).ok()
}

/// Whole-message fallback when MIME parsing fails: headers become
/// empty, everything after the first blank line is the plain body.
fn fallback_message(id: &str, raw: &[u8]) -> Message {
    let text = String::from_utf8_lossy(raw);
    let body = match text.find("\n\n").or_else(|| text.find("\r\n\r\n")) {
        Some(pos) => text[pos..].trim_start().to_string(),
        None => String::new(),
    };

    Message {
        meta: MessageMeta {
            id: id.to_string(),
            subject: String::new(),
            from: String::new(),
            to: String::new(),
            cc: None,
            date_raw: String::new(),
            date: None,
        },
        body_plain: if body.is_empty() { None } else { Some(body) },
        body_html: None,
        parts: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::PartKind;

    fn simple_html_message() -> Vec<u8> {
        concat!(
            "From: Alice <alice@example.com>\r\n",
            "To: Bob <bob@example.com>\r\n",
            "Subject: Hello\r\n",
            "Date: Wed, 15 Jan 2025 10:30:00 +0000\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "plain body\r\n",
            "--b1\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>html body</p>\r\n",
            "--b1--\r\n",
        )
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn test_walk_alternative_keeps_both_bodies() {
        let msg = walk_message("m1", &simple_html_message());
        assert_eq!(msg.body_plain.as_deref().map(str::trim), Some("plain body"));
        assert!(msg.body_html.as_deref().unwrap().contains("html body"));
        assert!(msg.parts.is_empty());
    }

    #[test]
    fn test_walk_extracts_meta() {
        let msg = walk_message("m1", &simple_html_message());
        assert_eq!(msg.meta.subject, "Hello");
        assert_eq!(msg.meta.from, "Alice <alice@example.com>");
        assert_eq!(msg.meta.to, "Bob <bob@example.com>");
        assert!(msg.meta.cc.is_none());
        assert_eq!(msg.meta.date_raw, "Wed, 15 Jan 2025 10:30:00 +0000");
        let date = msg.meta.date.unwrap();
        assert_eq!(date.format("%Y-%m-%d_%H-%M-%S").to_string(), "2025-01-15_10-30-00");
    }

    #[test]
    fn test_walk_inline_image_and_attachment() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Subject: Mixed\r\n",
            "Date: Wed, 15 Jan 2025 10:30:00 +0000\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/related; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>body with <img src=\"cid:img1\"></p>\r\n",
            "--inner\r\n",
            "Content-Type: image/png\r\n",
            "Content-ID: <img1>\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "Content-Disposition: inline\r\n",
            "\r\n",
            "iVBORw0KGgo=\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERi0xLjQ=\r\n",
            "--outer--\r\n",
        )
        .as_bytes();

        let msg = walk_message("m2", raw);
        assert!(msg.body_html.is_some());
        assert_eq!(msg.parts.len(), 2);

        let image = &msg.parts[0];
        assert_eq!(image.kind, PartKind::InlineImage);
        assert_eq!(image.content_id.as_deref(), Some("img1"));
        assert_eq!(image.content_type, "image/png");
        assert!(image.data.is_some());

        let pdf = &msg.parts[1];
        assert_eq!(pdf.kind, PartKind::Attachment);
        assert_eq!(pdf.filename.as_deref(), Some("report.pdf"));
        assert_eq!(pdf.content_type, "application/pdf");
    }

    #[test]
    fn test_image_with_attachment_disposition_is_attachment() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Subject: Photo\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "see attached\r\n",
            "--b\r\n",
            "Content-Type: image/jpeg\r\n",
            "Content-ID: <photo1>\r\n",
            "Content-Disposition: attachment; filename=\"photo.jpg\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "/9j/4AAQ\r\n",
            "--b--\r\n",
        )
        .as_bytes();

        let msg = walk_message("m3", raw);
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.parts[0].kind, PartKind::Attachment);
    }

    #[test]
    fn test_parse_date_with_comment() {
        let parsed = parse_date("Wed, 15 Jan 2025 10:30:00 +0000 (UTC)").unwrap();
        assert_eq!(parsed.timestamp(), 1736937000);
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_fallback_on_unparseable_input() {
        let msg = walk_message("m4", b"\x00\xff\x00garbage\n\nsome body text\n");
        assert!(msg.body_plain.is_some() || msg.body_plain.is_none());
        assert_eq!(msg.meta.id, "m4");
    }

    #[test]
    fn test_text_attachment_not_taken_as_body() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Subject: Log\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"b\"\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "the actual body\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"server.log\"\r\n",
            "\r\n",
            "log line 1\r\n",
            "--b--\r\n",
        )
        .as_bytes();

        let msg = walk_message("m5", raw);
        assert_eq!(msg.body_plain.as_deref().map(str::trim), Some("the actual body"));
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.parts[0].filename.as_deref(), Some("server.log"));
    }
}
