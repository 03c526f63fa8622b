//! Capture session states

use std::fmt;

/// Lifecycle states of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Finalizing,
    /// Failure being reported; resets to Idle once the report is delivered
    Error,
}

impl SessionState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Error => "error",
        }
    }

    /// A session is live from acquisition until it returns to idle
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Recording | Self::Finalizing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
