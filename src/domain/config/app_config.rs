//! Application configuration value object

use serde::{Deserialize, Serialize};

use crate::domain::capture::{CaptureOptions, SessionConfig};
use crate::domain::recording::Duration;

/// Default log filter when neither RUST_LOG nor the config sets one
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fragment interval handed to the encoder (e.g. "100ms")
    pub timeslice: Option<String>,
    /// Default recording length for `record` (unbounded when unset)
    pub duration: Option<String>,
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
    pub auto_gain_control: Option<bool>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            timeslice: Some("100ms".to_string()),
            duration: None,
            echo_cancellation: Some(true),
            noise_suppression: Some(true),
            auto_gain_control: Some(true),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            timeslice: other.timeslice.or(self.timeslice),
            duration: other.duration.or(self.duration),
            echo_cancellation: other.echo_cancellation.or(self.echo_cancellation),
            noise_suppression: other.noise_suppression.or(self.noise_suppression),
            auto_gain_control: other.auto_gain_control.or(self.auto_gain_control),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Get timeslice as parsed Duration, or the 100ms default if not set/invalid
    pub fn timeslice_or_default(&self) -> Duration {
        self.timeslice
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_timeslice)
    }

    /// Get the recording duration, if one is configured and valid
    pub fn duration(&self) -> Option<Duration> {
        self.duration.as_ref().and_then(|s| s.parse().ok())
    }

    /// Capture options; unset flags stay enabled
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            echo_cancellation: self.echo_cancellation.unwrap_or(true),
            noise_suppression: self.noise_suppression.unwrap_or(true),
            auto_gain_control: self.auto_gain_control.unwrap_or(true),
        }
    }

    /// Settings consumed by the session controller
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeslice: self.timeslice_or_default(),
            capture: self.capture_options(),
        }
    }

    pub fn log_level_or_default(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}
