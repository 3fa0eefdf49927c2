//! Shared tracing setup for the skyprobe binaries.

mod subscriber;

pub use subscriber::{LogFormat, init, init_with_level, parse_level};
