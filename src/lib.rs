//! voicecap - microphone capture session manager
//!
//! Acquires the default microphone, records it in the best encoding the
//! platform supports, and hands back one in-memory artifact per session.
//! Devices are always released, whichever way a session ends.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Formats, the chunk buffer, the session state machine, and errors
//! - **Application**: Format negotiation, the resource guard, the session controller, and port traits
//! - **Infrastructure**: Adapter implementations (cpal microphone, scripted device, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
