//! mailmark — convert email archives into clean Markdown documents.
//!
//! This crate provides the core library for walking MIME payloads,
//! stripping quoted replies and tracking noise, converting HTML bodies
//! to Markdown, materializing attachments, and writing collision-free
//! documents with YAML frontmatter.

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod source;
