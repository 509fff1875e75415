//! Data model: messages, MIME parts, and processed documents.

pub mod document;
pub mod message;
