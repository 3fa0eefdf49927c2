//! Multi-region dispatch coordinator.
//!
//! A pass walks the plan's region batches in order. Each batch launches one
//! task per job (bounded by a semaphore), every task sends exactly one
//! [`JobOutcome`] to a single aggregation task, and the batch is joined
//! before the coordinator paces and moves on.

mod invoker;
mod pacing;
mod report;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

pub use invoker::{HttpInvoker, Invoker, LocalInvoker};
pub use pacing::{PacingInterval, pacing_interval};
pub use report::{JobOutcome, PassReport};

use crate::DEFAULT_CONCURRENCY;
use crate::error::ProbeError;
use crate::resolver::{DispatchJob, DispatchPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Jobs allowed to run at once within a batch
    pub concurrency: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY }
    }
}

pub struct Coordinator {
    invoker: Arc<dyn Invoker>,
    settings: DispatchSettings,
}

impl Coordinator {
    pub fn new(invoker: Arc<dyn Invoker>, settings: DispatchSettings) -> Self {
        Self { invoker, settings }
    }

    /// Run every job of the plan once and collect one outcome per job
    pub async fn run_pass(&self, plan: &DispatchPlan) -> PassReport {
        let span = info_span!("pass", template = %plan.template);
        self.dispatch(plan).instrument(span).await
    }

    async fn dispatch(&self, plan: &DispatchPlan) -> PassReport {
        let pacing = pacing_interval(plan.total_interval, plan.batches.len());
        if pacing.degenerate {
            warn!(
                "{} regions do not fit in a {:?} interval, batches run back to back",
                plan.batches.len(),
                plan.total_interval
            );
        }

        let (tx, mut rx) = mpsc::channel::<JobOutcome>(1);
        let aggregator = tokio::spawn(async move {
            let mut outcomes = Vec::new();
            while let Some(outcome) = rx.recv().await {
                outcomes.push(outcome);
            }
            outcomes
        });

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let last = plan.batches.len().saturating_sub(1);

        for (index, batch) in plan.batches.iter().enumerate() {
            info!(region = %batch.region.region, "dispatching {} jobs", batch.jobs.len());

            let mut tasks = JoinSet::new();
            for job in &batch.jobs {
                tasks.spawn(run_job(self.invoker.clone(), semaphore.clone(), tx.clone(), job.clone()));
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("dispatch task failed: {e}");
                }
            }

            if index < last && !pacing.interval.is_zero() {
                info!("sleeping {:?} before the next region", pacing.interval);
                tokio::time::sleep(pacing.interval).await;
            }
        }

        drop(tx);
        let outcomes = aggregator.await.unwrap_or_else(|e| {
            error!("outcome aggregation failed: {e}");
            Vec::new()
        });

        PassReport { template: plan.template.clone(), outcomes, pacing }
    }
}

async fn run_job(
    invoker: Arc<dyn Invoker>,
    semaphore: Arc<Semaphore>,
    tx: mpsc::Sender<JobOutcome>,
    job: DispatchJob,
) {
    let _permit = semaphore.acquire_owned().await;

    let result = AssertUnwindSafe(invoker.invoke(&job.region, &job.invocation))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(ProbeError::Dispatch(format!("invocation panicked: {}", panic_message(panic.as_ref()))))
        });

    if let Err(e) = &result {
        warn!(region = %job.region, target = %job.invocation.target, "{e}");
    }

    let outcome = JobOutcome { region: job.region, target: job.invocation.target, result };
    if tx.send(outcome).await.is_err() {
        error!("outcome channel closed before the pass finished");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
