//! Ordered buffer of encoded fragments for the live session

use super::{Artifact, AudioFormat};

/// Accumulates fragments in arrival order until the session is finalized.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Zero-length fragments are dropped.
    ///
    /// Returns whether the fragment was kept.
    pub fn append(&mut self, fragment: Vec<u8>) -> bool {
        if fragment.is_empty() {
            return false;
        }
        self.total_bytes += fragment.len();
        self.chunks.push(fragment);
        true
    }

    /// Concatenate every fragment in arrival order into one artifact.
    ///
    /// The buffer is left untouched; callers clear it afterwards.
    pub fn assemble(&self, format: AudioFormat) -> Artifact {
        let mut payload = Vec::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            payload.extend_from_slice(chunk);
        }
        Artifact::new(payload, format)
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    /// Number of fragments held
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
