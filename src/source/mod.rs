//! The mail-fetching collaborator boundary.
//!
//! The pipeline consumes a sequence of message identifiers and, per
//! identifier, raw MIME bytes. It never initiates network calls; any
//! transport lives behind [`MessageSource`].

pub mod eml;

use crate::error::Result;

/// A provider of raw messages.
pub trait MessageSource {
    /// Identifiers of every available message, in a stable order.
    fn list(&self) -> Result<Vec<String>>;

    /// Raw RFC 5322 bytes for one message.
    fn fetch(&self, id: &str) -> Result<Vec<u8>>;
}
