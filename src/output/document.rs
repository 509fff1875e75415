//! Final document assembly: YAML frontmatter plus Markdown body.

use std::path::Path;

use crate::error::{ExportError, Result};
use crate::model::document::{AttachmentStatus, ProcessedDocument};
use crate::model::message::MessageMeta;

/// Render the complete document text for one message.
pub fn render_document(meta: &MessageMeta, doc: &ProcessedDocument) -> String {
    let mut out = String::with_capacity(doc.markdown.len() + 512);

    out.push_str(&render_frontmatter(meta, doc));
    out.push('\n');

    // Subject as H1
    let subject = if meta.subject.is_empty() {
        "(no subject)"
    } else {
        &meta.subject
    };
    out.push_str(&format!("# {subject}\n\n"));

    out.push_str("## Email Details\n");
    out.push_str(&format!("**From:** {}  \n", meta.from));
    out.push_str(&format!("**To:** {}  \n", meta.to));
    if let Some(cc) = &meta.cc {
        out.push_str(&format!("**CC:** {cc}  \n"));
    }
    out.push_str(&format!("**Date:** {}  \n", meta.date_raw));
    out.push('\n');

    out.push_str("## Content\n\n");

    if doc.degraded {
        out.push_str("*[Original HTML could not be fully converted; showing extracted text.]*\n\n");
    }

    if doc.markdown.is_empty() {
        out.push_str("*[No content available]*\n");
    } else {
        out.push_str(&doc.markdown);
        out.push('\n');
    }

    let failed: Vec<&str> = doc
        .attachments
        .iter()
        .filter(|a| a.status == AttachmentStatus::DecodeFailed)
        .map(|a| a.filename.as_str())
        .collect();
    if !failed.is_empty() {
        out.push('\n');
        for name in failed {
            out.push_str(&format!("*[Attachment \"{name}\" could not be decoded]*\n"));
        }
    }

    out
}

fn render_frontmatter(meta: &MessageMeta, doc: &ProcessedDocument) -> String {
    let mut lines = vec!["---".to_string()];
    lines.push(format!("subject: {}", yaml_quote(&meta.subject)));
    lines.push(format!("from: {}", yaml_quote(&meta.from)));
    lines.push(format!("to: {}", yaml_quote(&meta.to)));
    if let Some(cc) = &meta.cc {
        lines.push(format!("cc: {}", yaml_quote(cc)));
    }
    lines.push(format!("date: {}", yaml_quote(&meta.date_raw)));
    if let Some(date) = &meta.date {
        lines.push(format!("date_parsed: {}", date.to_rfc3339()));
    }

    if !doc.attachments.is_empty() {
        lines.push("attachments:".to_string());
        for att in &doc.attachments {
            lines.push(format!("  - filename: {}", yaml_quote(&att.filename)));
            lines.push(format!("    type: {}", yaml_quote(&att.media_type)));
            lines.push(format!("    size: {}", att.size));
            if let Some(path) = &att.local_path {
                lines.push(format!("    local_path: {}", yaml_quote(path)));
            }
        }
    }

    lines.push("---".to_string());
    lines.push(String::new());
    lines.join("\n")
}

/// Double-quote a YAML scalar with JSON-style escaping (valid YAML).
fn yaml_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Write the rendered document, mapping failures to the owning path.
pub fn write_document(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| ExportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::AttachmentRecord;
    use chrono::TimeZone;

    fn meta() -> MessageMeta {
        MessageMeta {
            id: "m1".into(),
            subject: "Weekly \"Report\"".into(),
            from: "Alice <alice@example.com>".into(),
            to: "Bob <bob@example.com>".into(),
            cc: None,
            date_raw: "Wed, 15 Jan 2025 10:30:00 +0000".into(),
            date: chrono::FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2025, 1, 15, 10, 30, 0)
                .single(),
        }
    }

    fn doc(markdown: &str) -> ProcessedDocument {
        ProcessedDocument {
            markdown: markdown.to_string(),
            attachments: Vec::new(),
            degraded: false,
            quotes_stripped: false,
        }
    }

    #[test]
    fn test_frontmatter_shape() {
        let rendered = render_document(&meta(), &doc("body text"));
        assert!(rendered.starts_with("---\n"));
        assert!(rendered.contains("subject: \"Weekly \\\"Report\\\"\""));
        assert!(rendered.contains("from: \"Alice <alice@example.com>\""));
        assert!(rendered.contains("date: \"Wed, 15 Jan 2025 10:30:00 +0000\""));
        assert!(rendered.contains("date_parsed: 2025-01-15T10:30:00+00:00"));
        assert!(rendered.contains("\n---\n"));
    }

    #[test]
    fn test_body_sections() {
        let rendered = render_document(&meta(), &doc("The content."));
        assert!(rendered.contains("# Weekly \"Report\""));
        assert!(rendered.contains("## Email Details"));
        assert!(rendered.contains("**From:** Alice <alice@example.com>"));
        assert!(rendered.contains("## Content\n\nThe content."));
    }

    #[test]
    fn test_no_cc_line_when_absent() {
        let rendered = render_document(&meta(), &doc("x"));
        assert!(!rendered.contains("cc:"));
        assert!(!rendered.contains("**CC:**"));
    }

    #[test]
    fn test_empty_body_marker() {
        let rendered = render_document(&meta(), &doc(""));
        assert!(rendered.contains("*[No content available]*"));
    }

    #[test]
    fn test_degraded_notice() {
        let mut d = doc("residual text");
        d.degraded = true;
        let rendered = render_document(&meta(), &d);
        assert!(rendered.contains("could not be fully converted"));
        assert!(rendered.contains("residual text"));
    }

    #[test]
    fn test_attachment_records() {
        let mut d = doc("x");
        d.attachments = vec![
            AttachmentRecord {
                filename: "report.pdf".into(),
                media_type: "application/pdf".into(),
                size: 12345,
                local_path: Some("attachments/base/report.pdf".into()),
                status: AttachmentStatus::Written,
            },
            AttachmentRecord {
                filename: "big.iso".into(),
                media_type: "application/octet-stream".into(),
                size: 999_999_999,
                local_path: None,
                status: AttachmentStatus::SkippedOversize,
            },
        ];
        let rendered = render_document(&meta(), &d);
        assert!(rendered.contains("attachments:"));
        assert!(rendered.contains("  - filename: \"report.pdf\""));
        assert!(rendered.contains("    local_path: \"attachments/base/report.pdf\""));
        assert!(rendered.contains("  - filename: \"big.iso\""));
        assert!(rendered.contains("    size: 999999999"));
        // No local_path for the skipped one.
        let after_iso = rendered.split("big.iso").nth(1).unwrap();
        assert!(!after_iso.contains("local_path"));
    }

    #[test]
    fn test_decode_failure_marker_in_body() {
        let mut d = doc("x");
        d.attachments = vec![AttachmentRecord {
            filename: "broken.zip".into(),
            media_type: "application/zip".into(),
            size: 10,
            local_path: None,
            status: AttachmentStatus::DecodeFailed,
        }];
        let rendered = render_document(&meta(), &d);
        assert!(rendered.contains("*[Attachment \"broken.zip\" could not be decoded]*"));
    }

    #[test]
    fn test_yaml_quote_escapes() {
        assert_eq!(yaml_quote("plain"), "\"plain\"");
        assert_eq!(yaml_quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(yaml_quote("a\\b"), "\"a\\\\b\"");
        assert_eq!(yaml_quote("a\nb"), "\"a\\nb\"");
        assert_eq!(yaml_quote("tab\there"), "\"tab\\there\"");
    }
}
