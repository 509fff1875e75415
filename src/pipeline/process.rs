//! Per-message orchestration: walk → strip quotes → sanitize →
//! materialize → resolve CIDs → write.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::document::{AttachmentRecord, AttachmentStatus, ProcessedDocument};
use crate::model::message::{Message, PartKind};
use crate::output::document::{render_document, write_document};
use crate::output::materialize::{materialize_part, MaterializeOutcome};
use crate::output::organizer::{document_base_name, NameRegistry, RunLayout};
use crate::pipeline::cid::{referenced_cids, resolve_cids};
use crate::pipeline::quotes::{strip_quotes, BodyKind};
use crate::pipeline::sanitize::sanitize_html;

/// Per-run pipeline options.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Skip quote stripping entirely, keeping full reply chains.
    pub keep_quotes: bool,
    /// Write attachment and inline-image payloads to disk.
    pub save_binaries: bool,
    /// Size limit for a single materialized binary.
    pub max_attachment_bytes: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            keep_quotes: false,
            save_binaries: false,
            max_attachment_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Run one message through the full pipeline and write its document.
///
/// Returns the path of the written document. Binary part failures
/// degrade the document but never fail it; only the final document
/// write can return an error.
pub fn process_message(
    msg: &Message,
    opts: &PipelineOptions,
    layout: &RunLayout,
    registry: &mut NameRegistry,
) -> Result<PathBuf> {
    let base = document_base_name(&msg.meta);
    let doc_path = registry.claim(layout.document_dir(), &base, "md");

    // Collision suffixes must flow into the sibling binary directories,
    // so the effective base comes from the claimed path.
    let doc_base = doc_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(base);

    let (markdown, degraded, quotes_stripped) = convert_body(msg, opts);

    let (records, cid_map) = handle_binaries(msg, opts, layout, &doc_base, registry);

    let markdown = resolve_cids(&markdown, &cid_map);

    // References without a materialized part stay in place as explicit
    // `cid:` markers; they are never silently dropped.
    if opts.save_binaries {
        let unresolved = referenced_cids(&markdown);
        if !unresolved.is_empty() {
            warn!(id = %msg.meta.id, cids = ?unresolved, "unresolved cid references left in place");
        }
    }

    let doc = ProcessedDocument {
        markdown,
        attachments: records,
        degraded,
        quotes_stripped,
    };

    let content = render_document(&msg.meta, &doc);
    write_document(&doc_path, &content)?;

    debug!(
        id = %msg.meta.id,
        path = %doc_path.display(),
        quotes_stripped = doc.quotes_stripped,
        "document written"
    );
    Ok(doc_path)
}

/// Pick the body (HTML preferred), strip quotes, convert to Markdown.
fn convert_body(msg: &Message, opts: &PipelineOptions) -> (String, bool, bool) {
    if let Some(html) = &msg.body_html {
        let (html, stripped) = if opts.keep_quotes {
            (html.clone(), false)
        } else {
            strip_quotes(html, BodyKind::Html)
        };
        let sanitized = sanitize_html(&html);
        return (sanitized.markdown, sanitized.degraded, stripped);
    }

    if let Some(plain) = &msg.body_plain {
        let (plain, stripped) = if opts.keep_quotes {
            (plain.clone(), false)
        } else {
            strip_quotes(plain, BodyKind::Plain)
        };
        return (plain.trim().to_string(), false, stripped);
    }

    (String::new(), false, false)
}

/// Materialize (or merely list) every binary part, producing the
/// attachment records and the content-id → relative-path mapping for
/// CID resolution.
fn handle_binaries(
    msg: &Message,
    opts: &PipelineOptions,
    layout: &RunLayout,
    doc_base: &str,
    registry: &mut NameRegistry,
) -> (Vec<AttachmentRecord>, HashMap<String, String>) {
    let mut records = Vec::with_capacity(msg.parts.len());
    let mut cid_map = HashMap::new();

    for part in &msg.parts {
        let filename = part.effective_filename();

        if !opts.save_binaries {
            let status = if part.data.is_none() {
                AttachmentStatus::DecodeFailed
            } else {
                AttachmentStatus::Listed
            };
            records.push(AttachmentRecord {
                filename,
                media_type: part.content_type.clone(),
                size: part.size,
                local_path: None,
                status,
            });
            continue;
        }

        let dest_dir = match part.kind {
            PartKind::InlineImage => layout.inline_images_dir(doc_base),
            PartKind::Attachment => layout.attachments_dir(doc_base),
        };

        let outcome = materialize_part(
            part,
            &dest_dir,
            layout.document_dir(),
            registry,
            opts.max_attachment_bytes,
        );

        let record = match outcome {
            MaterializeOutcome::Written { rel_path, size, .. } => {
                if let Some(cid) = &part.content_id {
                    cid_map.insert(cid.clone(), rel_path.clone());
                }
                AttachmentRecord {
                    filename,
                    media_type: part.content_type.clone(),
                    size,
                    local_path: Some(rel_path),
                    status: AttachmentStatus::Written,
                }
            }
            MaterializeOutcome::SkippedOversize { declared_size } => {
                warn!(
                    id = %msg.meta.id,
                    filename = %filename,
                    size = declared_size,
                    "skipping oversize binary part"
                );
                AttachmentRecord {
                    filename,
                    media_type: part.content_type.clone(),
                    size: declared_size,
                    local_path: None,
                    status: AttachmentStatus::SkippedOversize,
                }
            }
            MaterializeOutcome::Failed { reason } => {
                warn!(
                    id = %msg.meta.id,
                    filename = %filename,
                    reason = %reason,
                    "binary part failed"
                );
                AttachmentRecord {
                    filename,
                    media_type: part.content_type.clone(),
                    size: part.size,
                    local_path: None,
                    status: AttachmentStatus::DecodeFailed,
                }
            }
        };
        records.push(record);
    }

    (records, cid_map)
}
