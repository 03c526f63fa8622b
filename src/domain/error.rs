//! Domain error types

use std::fmt;

use thiserror::Error;

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>ms, <number>s, <number>m, or <number>m<number>s (e.g., 100ms, 30s, 1m, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}

/// Classification of a failed capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureErrorKind {
    PermissionDenied,
    DeviceNotFound,
    FormatUnsupported,
    PlatformUnsupported,
    DeviceFailure,
    Unknown,
}

impl CaptureErrorKind {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::DeviceNotFound => "device-not-found",
            Self::FormatUnsupported => "format-unsupported",
            Self::PlatformUnsupported => "platform-unsupported",
            Self::DeviceFailure => "device-failure",
            Self::Unknown => "unknown",
        }
    }

    /// Message shown to the user when the device gave no better detail
    pub const fn default_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Microphone access was denied. Allow microphone access and try again."
            }
            Self::DeviceNotFound => "No microphone found. Check that an input device is connected.",
            Self::FormatUnsupported => "The selected audio format cannot be recorded on this device.",
            Self::PlatformUnsupported => "Audio capture is not supported on this platform.",
            Self::DeviceFailure => "Recording failed. Please try again.",
            Self::Unknown => "Could not access the microphone.",
        }
    }
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified capture failure handed to the caller's error callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CaptureError {
    pub kind: CaptureErrorKind,
    pub message: String,
}

impl CaptureError {
    /// Create an error with an explicit message
    pub fn new(kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an error carrying the kind's default message
    pub fn of_kind(kind: CaptureErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Create an error with the kind's default message followed by a detail
    pub fn with_detail(kind: CaptureErrorKind, detail: &str) -> Self {
        let detail = detail.trim();
        if detail.is_empty() {
            Self::of_kind(kind)
        } else {
            Self::new(kind, format!("{} ({})", kind.default_message(), detail))
        }
    }

    pub fn permission_denied() -> Self {
        Self::of_kind(CaptureErrorKind::PermissionDenied)
    }

    pub fn platform_unsupported() -> Self {
        Self::of_kind(CaptureErrorKind::PlatformUnsupported)
    }

    pub fn device_failure(detail: &str) -> Self {
        Self::with_detail(CaptureErrorKind::DeviceFailure, detail)
    }

    pub fn unknown(detail: &str) -> Self {
        Self::with_detail(CaptureErrorKind::Unknown, detail)
    }
}
