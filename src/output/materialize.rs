//! Binary materialization: write attachment and inline-image payloads
//! to disk under a size policy.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::message::Part;
use crate::output::organizer::{sanitize_binary_filename, NameRegistry};

/// Outcome of materializing a single part.
#[derive(Debug, Clone)]
pub enum MaterializeOutcome {
    /// The payload was written. `rel_path` is relative to the owning
    /// document's directory, with `/` separators.
    Written { path: PathBuf, rel_path: String, size: u64 },
    /// Declared size exceeds the limit; nothing was written.
    SkippedOversize { declared_size: u64 },
    /// The payload could not be decoded or written.
    Failed { reason: String },
}

/// Write one part's payload into `dest_dir`.
///
/// The size limit is checked against the declared size before any byte
/// touches the disk, so an oversize part never leaves a partial file.
/// Failures are reported per part and never abort the caller's loop.
pub fn materialize_part(
    part: &Part,
    dest_dir: &Path,
    doc_dir: &Path,
    registry: &mut NameRegistry,
    max_bytes: u64,
) -> MaterializeOutcome {
    if part.size > max_bytes {
        return MaterializeOutcome::SkippedOversize {
            declared_size: part.size,
        };
    }

    let Some(data) = &part.data else {
        return MaterializeOutcome::Failed {
            reason: "payload could not be decoded".to_string(),
        };
    };

    if let Err(e) = std::fs::create_dir_all(dest_dir) {
        warn!(dir = %dest_dir.display(), error = %e, "cannot create binary output directory");
        return MaterializeOutcome::Failed {
            reason: format!("cannot create {}: {e}", dest_dir.display()),
        };
    }

    let (stem, ext) = sanitize_binary_filename(&part.effective_filename());
    let path = registry.claim(dest_dir, &stem, &ext);

    match std::fs::write(&path, data) {
        Ok(()) => {
            let rel_path = relative_to(&path, doc_dir);
            MaterializeOutcome::Written {
                path,
                rel_path,
                size: data.len() as u64,
            }
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to write binary part");
            MaterializeOutcome::Failed {
                reason: format!("write failed: {e}"),
            }
        }
    }
}

/// Path relative to `base`, joined with forward slashes for use inside
/// Markdown regardless of platform.
fn relative_to(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::PartKind;

    fn part(filename: &str, size: u64, data: Option<Vec<u8>>) -> Part {
        Part {
            kind: PartKind::Attachment,
            content_type: "application/pdf".to_string(),
            content_id: None,
            filename: Some(filename.to_string()),
            size,
            data,
        }
    }

    #[test]
    fn test_written_part() {
        let tmp = tempfile::tempdir().unwrap();
        let doc_dir = tmp.path();
        let dest = doc_dir.join("attachments").join("base");
        let mut reg = NameRegistry::new();

        let p = part("report.pdf", 4, Some(b"%PDF".to_vec()));
        let outcome = materialize_part(&p, &dest, doc_dir, &mut reg, 10 * 1024 * 1024);

        match outcome {
            MaterializeOutcome::Written { path, rel_path, size } => {
                assert_eq!(rel_path, "attachments/base/report.pdf");
                assert_eq!(size, 4);
                assert_eq!(std::fs::read(path).unwrap(), b"%PDF");
            }
            other => panic!("expected Written, got {other:?}"),
        }
    }

    #[test]
    fn test_oversize_skip_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("attachments").join("base");
        let mut reg = NameRegistry::new();

        // Declared 12 MB against a 10 MB limit.
        let p = part("big.bin", 12 * 1024 * 1024, Some(vec![0u8; 16]));
        let outcome = materialize_part(&p, &dest, tmp.path(), &mut reg, 10 * 1024 * 1024);

        match outcome {
            MaterializeOutcome::SkippedOversize { declared_size } => {
                assert_eq!(declared_size, 12 * 1024 * 1024);
            }
            other => panic!("expected SkippedOversize, got {other:?}"),
        }
        // The destination directory was never even created.
        assert!(!dest.exists());
    }

    #[test]
    fn test_decode_failure_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("a");
        let mut reg = NameRegistry::new();

        let p = part("broken.bin", 8, None);
        let outcome = materialize_part(&p, &dest, tmp.path(), &mut reg, u64::MAX);
        assert!(matches!(outcome, MaterializeOutcome::Failed { .. }));
    }

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("attachments").join("base");
        let mut reg = NameRegistry::new();

        let p = part("scan.pdf", 1, Some(b"a".to_vec()));
        let first = materialize_part(&p, &dest, tmp.path(), &mut reg, u64::MAX);
        let second = materialize_part(&p, &dest, tmp.path(), &mut reg, u64::MAX);

        let rel = |o: &MaterializeOutcome| match o {
            MaterializeOutcome::Written { rel_path, .. } => rel_path.clone(),
            other => panic!("expected Written, got {other:?}"),
        };
        assert_eq!(rel(&first), "attachments/base/scan.pdf");
        assert_eq!(rel(&second), "attachments/base/scan_2.pdf");
    }
}
