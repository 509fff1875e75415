//! Message source backed by a directory of `.eml` files.

use std::path::PathBuf;

use crate::error::{ExportError, Result};
use crate::source::MessageSource;

/// Reads raw messages from `<dir>/*.eml`. The file name (without
/// extension) is the message identifier.
pub struct EmlDirSource {
    dir: PathBuf,
}

impl EmlDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ExportError::Source {
                id: dir.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self { dir })
    }
}

impl MessageSource for EmlDirSource {
    /// Sorted for a deterministic processing order (and therefore
    /// deterministic collision suffixes).
    fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.dir).map_err(|e| ExportError::io(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ExportError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("eml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.dir.join(format!("{id}.eml"));
        std::fs::read(&path).map_err(|e| ExportError::Source {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}
