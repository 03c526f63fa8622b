//! Capture device adapters
//!
//! [`CpalBackend`] records from the real default microphone; the scripted
//! backend stands in for it in tests and `--simulate` runs.

mod cpal_backend;
mod scripted;

pub use cpal_backend::{CpalBackend, CpalStream, CpalTrack, WavEncoder};
pub use scripted::{ScriptedBackend, ScriptedDevice, ScriptedEncoder, ScriptedStream, ScriptedTrack};
