//! Capture options and per-session configuration

use crate::domain::recording::Duration;

/// Processing requested from the device when opening the microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Settings the session controller applies to every session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    /// Interval at which the encoder is asked to emit fragments
    pub timeslice: Duration,
    pub capture: CaptureOptions,
}
