//! Recording domain module

mod duration;

pub use duration::{Duration, DEFAULT_TIMESLICE_MS};
