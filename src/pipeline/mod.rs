//! The content transformation pipeline: payload walking, quote
//! stripping, HTML sanitization, CID resolution, and per-message
//! orchestration.

pub mod cid;
pub mod quotes;
pub mod sanitize;
pub mod walker;

mod process;

pub use process::{process_message, PipelineOptions};
