//! Schema module for skyprobe.
//!
//! This module contains the template, invocation payload and result types.

pub mod invocation;
pub mod result;
pub mod template;

pub use invocation::Invocation;
pub use result::{PhaseDurations, ProbeResult, Protocol, ResultRecord};
pub use template::{Method, Region, Target, Template};
