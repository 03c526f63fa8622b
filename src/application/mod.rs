//! Application layer - Use cases and port interfaces
//!
//! Contains the capture session use cases (format negotiation, resource
//! release and the session controller) and the trait definitions for
//! the device and config adapters.

pub mod capability;
pub mod controller;
pub mod guard;
pub mod ports;

// Re-export use cases
pub use capability::{negotiate, negotiate_from, probe_formats, FormatSupport};
pub use controller::{CaptureCallbacks, SessionController, SessionHandle};
pub use guard::{stop_tracks, ResourceGuard};
