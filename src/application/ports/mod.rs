//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod config;
pub mod device;

// Re-export common types
pub use config::ConfigStore;
pub use device::{
    AudioEncoder, CaptureBackend, DeviceError, DeviceErrorKind, EncoderEvent, EncoderEventSender,
    EncoderState, MediaStream, MediaTrack, check_timeslice,
};
