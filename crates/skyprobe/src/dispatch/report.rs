use std::fmt;

use tracing::{info, warn};

use super::pacing::PacingInterval;
use crate::error::ProbeError;

/// Outcome of one dispatched job
#[derive(Debug)]
pub struct JobOutcome {
    pub region: String,
    pub target: String,
    pub result: Result<(), ProbeError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every job outcome of one pass, in completion order
#[derive(Debug)]
pub struct PassReport {
    pub template: String,
    pub outcomes: Vec<JobOutcome>,
    pub pacing: PacingInterval,
}

impl PassReport {
    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.len() - self.failure_count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Log one summary line and one line per failed job
    pub fn log_summary(&self) {
        info!(
            template = %self.template,
            "pass finished: {} jobs, {} succeeded, {} failed",
            self.outcomes.len(),
            self.success_count(),
            self.failure_count()
        );
        for outcome in self.failures() {
            if let Err(e) = &outcome.result {
                warn!(region = %outcome.region, target = %outcome.target, "{e}");
            }
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}/{} jobs succeeded",
            self.template,
            self.success_count(),
            self.outcomes.len()
        )?;
        for outcome in &self.outcomes {
            match &outcome.result {
                Ok(()) => writeln!(f, "  ok     {} {}", outcome.region, outcome.target)?,
                Err(e) => writeln!(f, "  failed {} {}: {e}", outcome.region, outcome.target)?,
            }
        }
        Ok(())
    }
}
