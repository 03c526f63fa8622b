//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces:
//! microphone capture through cpal, a scripted device for tests and
//! simulation, and XDG config file storage.

pub mod config;
pub mod device;

// Re-export adapters
pub use config::XdgConfigStore;
pub use device::{CpalBackend, ScriptedBackend, ScriptedDevice};
