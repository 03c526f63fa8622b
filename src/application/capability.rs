//! Format negotiation against the platform's capture capability

use tracing::debug;

use crate::domain::capture::{AudioFormat, CANDIDATE_FORMATS};
use crate::domain::error::CaptureError;

use super::ports::CaptureBackend;

/// Support status of one candidate format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSupport {
    pub format: AudioFormat,
    pub supported: bool,
}

/// Pick the first supported format from the default candidate list.
///
/// Fails only when the platform cannot capture or encode at all. When no
/// candidate is supported the [`AudioFormat::Unspecified`] sentinel is
/// returned so the encoder falls back to its own default.
pub fn negotiate<B: CaptureBackend + ?Sized>(backend: &B) -> Result<AudioFormat, CaptureError> {
    negotiate_from(backend, &CANDIDATE_FORMATS)
}

/// Same as [`negotiate`] with an explicit preference order
pub fn negotiate_from<B: CaptureBackend + ?Sized>(
    backend: &B,
    candidates: &[AudioFormat],
) -> Result<AudioFormat, CaptureError> {
    if !backend.supports_capture() || !backend.supports_encoding() {
        return Err(CaptureError::platform_unsupported());
    }

    match candidates
        .iter()
        .copied()
        .find(|format| backend.is_format_supported(*format))
    {
        Some(format) => {
            debug!(%format, "Negotiated audio format");
            Ok(format)
        }
        None => {
            debug!("No candidate format supported, using encoder default");
            Ok(AudioFormat::Unspecified)
        }
    }
}

/// Support status of every default candidate, in preference order
pub fn probe_formats<B: CaptureBackend + ?Sized>(backend: &B) -> Vec<FormatSupport> {
    CANDIDATE_FORMATS
        .iter()
        .map(|&format| FormatSupport {
            format,
            supported: backend.is_format_supported(format),
        })
        .collect()
}
