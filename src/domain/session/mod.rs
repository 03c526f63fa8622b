//! Capture session domain module

mod machine;
mod state;

pub use machine::{transition, Effect, SessionEvent, SessionMachine, Transition};
pub use state::SessionState;
