//! Core message and MIME part types.

use chrono::{DateTime, FixedOffset};

/// Header metadata for a single email message.
///
/// `from`/`to`/`cc` are decoded display strings (`"Name <addr>"`, comma
/// separated). The date is kept both as the raw header value and as a
/// parsed timestamp, since the raw string goes into the frontmatter
/// verbatim while the timestamp drives file naming and sorting.
#[derive(Debug, Clone)]
pub struct MessageMeta {
    /// Source-assigned message identifier.
    pub id: String,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// Sender display string.
    pub from: String,

    /// Primary recipients display string.
    pub to: String,

    /// Carbon-copy recipients, if any.
    pub cc: Option<String>,

    /// Raw `Date:` header value.
    pub date_raw: String,

    /// Parsed date. `None` if the header is missing or unparseable.
    pub date: Option<DateTime<FixedOffset>>,
}

/// One fetched email, as produced by the payload walker.
///
/// Immutable once constructed; consumed by the downstream pipeline stages
/// and discarded after the document is written.
#[derive(Debug, Clone)]
pub struct Message {
    pub meta: MessageMeta,

    /// Plain-text body, if the message carries one.
    pub body_plain: Option<String>,

    /// HTML body, if the message carries one. Preferred over plain text
    /// for conversion when both exist.
    pub body_html: Option<String>,

    /// Every non-body MIME leaf, in document order.
    pub parts: Vec<Part>,
}

impl Message {
    /// Inline-image parts, in document order.
    pub fn inline_images(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| p.kind == PartKind::InlineImage)
    }

    /// Regular attachment parts, in document order.
    pub fn attachments(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| p.kind == PartKind::Attachment)
    }
}

/// Classification of a non-body MIME leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// Image part with a Content-ID, referenced from the HTML body.
    InlineImage,
    /// Regular attachment.
    Attachment,
}

/// One MIME leaf. Owned exclusively by its parent [`Message`].
#[derive(Debug, Clone)]
pub struct Part {
    pub kind: PartKind,

    /// Full media type (e.g. `"image/png"`, `"application/pdf"`).
    pub content_type: String,

    /// Content-ID with angle brackets stripped, for `cid:` resolution.
    pub content_id: Option<String>,

    /// Declared filename, if the headers carry one.
    pub filename: Option<String>,

    /// Decoded size in bytes (declared size for undecodable parts).
    pub size: u64,

    /// Decoded payload. `None` marks a decoding failure: the part is
    /// still listed but can never be materialized.
    pub data: Option<Vec<u8>>,
}

impl Part {
    /// Effective filename: the declared one, or one generated from the
    /// content-id / media type for unnamed parts.
    pub fn effective_filename(&self) -> String {
        if let Some(name) = &self.filename {
            if !name.is_empty() {
                return name.clone();
            }
        }
        let ext = self
            .content_type
            .split('/')
            .nth(1)
            .filter(|s| !s.is_empty())
            .unwrap_or("bin");
        match &self.content_id {
            Some(cid) => format!("{cid}.{ext}"),
            None => format!("unnamed.{ext}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(kind: PartKind, filename: Option<&str>, cid: Option<&str>, ctype: &str) -> Part {
        Part {
            kind,
            content_type: ctype.to_string(),
            content_id: cid.map(String::from),
            filename: filename.map(String::from),
            size: 0,
            data: Some(Vec::new()),
        }
    }

    #[test]
    fn test_effective_filename_declared() {
        let p = part(PartKind::Attachment, Some("report.pdf"), None, "application/pdf");
        assert_eq!(p.effective_filename(), "report.pdf");
    }

    #[test]
    fn test_effective_filename_from_cid() {
        let p = part(PartKind::InlineImage, None, Some("img1"), "image/png");
        assert_eq!(p.effective_filename(), "img1.png");
    }

    #[test]
    fn test_effective_filename_unnamed() {
        let p = part(PartKind::Attachment, None, None, "application/octet-stream");
        assert_eq!(p.effective_filename(), "unnamed.octet-stream");
    }

    #[test]
    fn test_part_iterators() {
        let msg = Message {
            meta: MessageMeta {
                id: "1".into(),
                subject: String::new(),
                from: String::new(),
                to: String::new(),
                cc: None,
                date_raw: String::new(),
                date: None,
            },
            body_plain: None,
            body_html: None,
            parts: vec![
                part(PartKind::InlineImage, None, Some("a"), "image/png"),
                part(PartKind::Attachment, Some("x.pdf"), None, "application/pdf"),
                part(PartKind::InlineImage, None, Some("b"), "image/gif"),
            ],
        };
        assert_eq!(msg.inline_images().count(), 2);
        assert_eq!(msg.attachments().count(), 1);
    }
}
