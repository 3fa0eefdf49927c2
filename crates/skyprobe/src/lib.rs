//! skyprobe - multi-region synthetic HTTP probing engine
//!
//! This library provides the probe execution engine (an instrumented HTTP
//! round-trip tracer behind a pluggable prober interface) and the dispatch
//! coordinator that fans a probe pass out across a region×target matrix.

pub mod dispatch;
pub mod error;
pub mod prober;
pub mod reporter;
pub mod resolver;
pub mod schema;
pub mod tracer;
pub mod worker;

// Re-export main types
pub use dispatch::{
    Coordinator, DispatchSettings, HttpInvoker, Invoker, JobOutcome, LocalInvoker, PacingInterval, PassReport,
};
pub use error::ProbeError;
pub use prober::{ProbeContext, Prober, ProberKind, new_prober};
pub use reporter::Reporter;
pub use resolver::{ALL_REGIONS, DispatchJob, DispatchPlan, RegionBatch, Resolver};
pub use schema::{Invocation, Method, ProbeResult, Region, Target, Template};
pub use tracer::Tracer;

/// skyprobe result type
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Timeout applied to a probe when neither the target nor the template sets one
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Seconds between full passes when the template leaves `interval` unset
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Region used when a template lists none
pub const DEFAULT_REGION: &str = "us-east-1";

/// Upper bound on concurrently running jobs within one region batch
pub const DEFAULT_CONCURRENCY: usize = 32;

/// User agent sent by every probe
pub const USER_AGENT: &str = concat!("skyprobe/", env!("CARGO_PKG_VERSION"));
