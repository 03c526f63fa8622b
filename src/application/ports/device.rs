//! Audio device port interfaces
//!
//! The capture core never talks to a microphone directly. A backend hands
//! out media streams (one or more tracks) and encoders bound to them;
//! encoders report back through an event channel registered at creation.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::capture::{AudioFormat, CaptureOptions};
use crate::domain::error::{CaptureError, CaptureErrorKind};
use crate::domain::recording::Duration;

/// The device subsystem's own failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// The user or policy refused microphone access
    NotAllowed,
    /// Access blocked by a security restriction
    Security,
    NotFound,
    /// No device satisfies the requested constraints
    Overconstrained,
    /// Capture is not available on this platform at all
    NotSupported,
    /// The encoder cannot produce the requested format
    UnsupportedFormat,
    /// The hardware could not be read (busy, unplugged, driver fault)
    NotReadable,
    Aborted,
    Other,
}

impl DeviceErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotAllowed => "not-allowed",
            Self::Security => "security",
            Self::NotFound => "not-found",
            Self::Overconstrained => "overconstrained",
            Self::NotSupported => "not-supported",
            Self::UnsupportedFormat => "unsupported-format",
            Self::NotReadable => "not-readable",
            Self::Aborted => "aborted",
            Self::Other => "other",
        }
    }

    /// Map onto the capture error taxonomy
    pub const fn classify(&self) -> CaptureErrorKind {
        match self {
            Self::NotAllowed | Self::Security => CaptureErrorKind::PermissionDenied,
            Self::NotFound | Self::Overconstrained => CaptureErrorKind::DeviceNotFound,
            Self::UnsupportedFormat => CaptureErrorKind::FormatUnsupported,
            Self::NotSupported => CaptureErrorKind::PlatformUnsupported,
            Self::NotReadable | Self::Aborted => CaptureErrorKind::DeviceFailure,
            Self::Other => CaptureErrorKind::Unknown,
        }
    }
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error raised by a device backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

impl DeviceError {
    pub fn new(kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<DeviceError> for CaptureError {
    fn from(err: DeviceError) -> Self {
        CaptureError::with_detail(err.kind.classify(), &err.message)
    }
}

/// Lifecycle of an encoder as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderState {
    #[default]
    Inactive,
    Recording,
    Paused,
}

/// Events an encoder delivers while it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// One encoded fragment, possibly empty
    DataAvailable(Vec<u8>),
    /// The encoder finished; no further fragments follow
    Stopped,
    Error(DeviceError),
}

/// Channel an encoder reports its events on
pub type EncoderEventSender = mpsc::UnboundedSender<EncoderEvent>;

/// One track of an acquired media stream
pub trait MediaTrack: Send {
    /// Track kind, e.g. "audio"
    fn kind(&self) -> &str;

    fn is_live(&self) -> bool;

    /// Stop the track. Stopping an ended track has no effect.
    fn stop(&mut self);
}

/// An acquired microphone stream, exclusively owned by one session
pub trait MediaStream: Send + 'static {
    type Track: MediaTrack;

    fn tracks_mut(&mut self) -> &mut [Self::Track];
}

/// Reject a fragment interval an encoder cannot tick on
pub fn check_timeslice(timeslice: Duration) -> Result<(), DeviceError> {
    if timeslice.as_millis() == 0 {
        return Err(DeviceError::new(
            DeviceErrorKind::Other,
            "timeslice must be at least 1ms",
        ));
    }
    Ok(())
}

/// Encoder bound to a media stream
pub trait AudioEncoder: Send + 'static {
    fn state(&self) -> EncoderState;

    /// Begin encoding, emitting a fragment every `timeslice`.
    /// A zero timeslice is an error.
    fn start(&mut self, timeslice: Duration) -> Result<(), DeviceError>;

    /// Resume a paused encoder
    fn resume(&mut self) -> Result<(), DeviceError>;

    /// Ask the encoder to stop. It flushes its last fragment and then
    /// confirms with [`EncoderEvent::Stopped`].
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// Port for the platform's audio capture capability
#[async_trait]
pub trait CaptureBackend: Send + Sync + 'static {
    type Stream: MediaStream;
    type Encoder: AudioEncoder;

    /// Whether the platform exposes microphone acquisition at all
    fn supports_capture(&self) -> bool;

    /// Whether the platform exposes an encoding primitive at all
    fn supports_encoding(&self) -> bool;

    fn is_format_supported(&self, format: AudioFormat) -> bool;

    /// Request an audio-only stream from the default microphone.
    ///
    /// This is the only operation that suspends; it may wait on a user
    /// permission prompt for an unbounded time.
    async fn request_stream(&self, options: CaptureOptions) -> Result<Self::Stream, DeviceError>;

    /// Construct an encoder for `stream`. Passing [`AudioFormat::Unspecified`]
    /// lets the encoder choose its own default.
    fn create_encoder(
        &self,
        stream: &Self::Stream,
        format: AudioFormat,
        events: EncoderEventSender,
    ) -> Result<Self::Encoder, DeviceError>;
}
