//! Artifact value object

use super::AudioFormat;

/// Finalized audio produced by one completed capture session.
/// Contains the concatenated encoded bytes and the negotiated format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    data: Vec<u8>,
    format: AudioFormat,
}

impl Artifact {
    /// Create an Artifact from raw bytes
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    /// Get the encoded audio bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the encoded audio bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the negotiated format
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// MIME type of the payload
    pub fn mime_type(&self) -> &'static str {
        self.format.artifact_mime()
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_size() {
        let artifact = Artifact::new(vec![0u8; 1024], AudioFormat::Webm);
        assert_eq!(artifact.size_bytes(), 1024);
        assert!(!artifact.is_empty());
    }

    #[test]
    fn into_data_hands_over_bytes() {
        let artifact = Artifact::new(vec![1, 2, 3], AudioFormat::Wav);
        assert_eq!(artifact.into_data(), vec![1, 2, 3]);
    }

    #[test]
    fn empty_artifact() {
        let artifact = Artifact::new(Vec::new(), AudioFormat::WebmOpus);
        assert!(artifact.is_empty());
        assert_eq!(artifact.human_readable_size(), "0 B");
    }

    #[test]
    fn human_readable_size_kb() {
        let artifact = Artifact::new(vec![0u8; 2048], AudioFormat::Webm);
        assert_eq!(artifact.human_readable_size(), "2.0 KB");
    }

    #[test]
    fn human_readable_size_mb() {
        let artifact = Artifact::new(vec![0u8; 2 * 1024 * 1024], AudioFormat::Webm);
        assert_eq!(artifact.human_readable_size(), "2.0 MB");
    }

    #[test]
    fn mime_type_of_unspecified_format() {
        let artifact = Artifact::new(vec![1, 2], AudioFormat::Unspecified);
        assert_eq!(artifact.mime_type(), "audio/webm");
        assert_eq!(artifact.format(), AudioFormat::Unspecified);
    }
}
