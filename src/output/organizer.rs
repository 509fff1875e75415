//! Deterministic output paths: name sanitization, collision resolution,
//! and the export directory layout.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::model::message::MessageMeta;

/// Maximum length of a sanitized document base name.
const MAX_BASE_LEN: usize = 100;

/// Maximum length of a sanitized binary filename (stem + extension).
const MAX_FILENAME_LEN: usize = 150;

/// Per-run bookkeeping of claimed output paths.
///
/// Collision resolution consults this table, not the filesystem, so the
/// layout of one run is a pure function of (message identity, part order)
/// and never depends on leftovers from prior runs. The first claimant of
/// a name keeps it unsuffixed; later claimants get `_2`, `_3`, ….
#[derive(Debug, Default)]
pub struct NameRegistry {
    claimed: HashSet<PathBuf>,
    next_suffix: HashMap<PathBuf, u32>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a collision-free path for `base` (+ optional `ext`) in `dir`.
    pub fn claim(&mut self, dir: &Path, base: &str, ext: &str) -> PathBuf {
        let first = dir.join(join_name(base, ext));
        if self.claimed.insert(first.clone()) {
            return first;
        }

        let mut n = self.next_suffix.get(&first).copied().unwrap_or(2);
        loop {
            let candidate = dir.join(join_name(&format!("{base}_{n}"), ext));
            n += 1;
            if self.claimed.insert(candidate.clone()) {
                self.next_suffix.insert(first, n);
                return candidate;
            }
        }
    }
}

fn join_name(base: &str, ext: &str) -> String {
    if ext.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{ext}")
    }
}

/// Sanitize a string for use as a filename component.
///
/// Removes characters illegal on common filesystems and control
/// characters, collapses whitespace/underscore runs, truncates to
/// `max_len` characters, and strips trailing dots and spaces.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_sep = false;

    for c in name.chars() {
        let mapped = match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 || c as u32 == 0x7f => continue,
            c => c,
        };
        if mapped == '_' || mapped.is_whitespace() {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }

    let truncated: String = out.chars().take(max_len).collect();
    let trimmed = truncated.trim_end_matches(['.', ' ', '_']);

    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitize a binary part's filename, preserving its extension.
///
/// The extension survives truncation: `averylongname.pdf` shortens its
/// stem, never its `.pdf`.
pub fn sanitize_binary_filename(name: &str) -> (String, String) {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, ext),
        _ => (name, ""),
    };

    let ext = sanitize_extension(ext);
    let max_stem = MAX_FILENAME_LEN.saturating_sub(ext.len() + 1).max(1);
    let stem = sanitize_filename(stem, max_stem);
    (stem, ext)
}

fn sanitize_extension(ext: &str) -> String {
    ext.chars()
        .filter(|c| c.is_alphanumeric())
        .take(10)
        .collect::<String>()
        .to_lowercase()
}

/// Compute a document's base name: `<timestamp>_<subject_slug>`.
///
/// The timestamp uses the message date; unparseable dates fall back to
/// the Unix epoch so the name stays stable across runs. The slug is
/// lowercased.
pub fn document_base_name(meta: &MessageMeta) -> String {
    let timestamp = format_timestamp(meta.date.as_ref());
    let subject = if meta.subject.trim().is_empty() {
        "no_subject".to_string()
    } else {
        meta.subject.clone()
    };
    let slug = sanitize_filename(&subject, MAX_BASE_LEN).to_lowercase();
    format!("{timestamp}_{slug}")
}

fn format_timestamp(date: Option<&DateTime<FixedOffset>>) -> String {
    match date {
        Some(dt) => dt.format("%Y-%m-%d_%H-%M-%S").to_string(),
        None => "1970-01-01_00-00-00".to_string(),
    }
}

/// Directory layout for one export run:
/// `<output_dir>/<export_date>_export/<filter_label>/`, with sibling
/// `attachments/<doc_base>/` and `inline-images/<doc_base>/` trees for
/// materialized binaries.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(output_dir: &Path, export_date: NaiveDate, filter_label: &str) -> Self {
        let label = sanitize_filename(filter_label, MAX_BASE_LEN);
        let root = output_dir
            .join(format!("{}_export", export_date.format("%Y-%m-%d")))
            .join(label);
        Self { root }
    }

    /// The directory documents are written into.
    pub fn document_dir(&self) -> &Path {
        &self.root
    }

    /// Attachment directory for the document with the given base name.
    pub fn attachments_dir(&self, doc_base: &str) -> PathBuf {
        self.root.join("attachments").join(doc_base)
    }

    /// Inline-image directory for the document with the given base name.
    pub fn inline_images_dir(&self, doc_base: &str) -> PathBuf {
        self.root.join("inline-images").join(doc_base)
    }
}
