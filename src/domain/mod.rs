//! Domain layer - Core capture logic
//!
//! Contains value objects, the session state machine, and domain errors.
//! This layer has no dependencies on devices or runtimes.

pub mod capture;
pub mod config;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use capture::{Artifact, AudioFormat, CaptureOptions, ChunkBuffer, SessionConfig};
pub use config::AppConfig;
pub use error::*;
pub use recording::Duration;
pub use session::{SessionEvent, SessionMachine, SessionState};
