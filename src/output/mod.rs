//! Output side of the pipeline: path organization, binary
//! materialization, and document rendering.

pub mod document;
pub mod materialize;
pub mod organizer;
