//! Capture domain module
//!
//! Formats, capture options, the fragment buffer and the finished artifact.

mod artifact;
mod chunk_buffer;
mod format;
mod options;

pub use artifact::Artifact;
pub use chunk_buffer::ChunkBuffer;
pub use format::{AudioFormat, CANDIDATE_FORMATS};
pub use options::{CaptureOptions, SessionConfig};
