//! Shared utilities for the accrue workspace.

pub mod logging;
pub mod time;

pub use logging::init_tracing;
pub use time::{format_clock, format_duration};
