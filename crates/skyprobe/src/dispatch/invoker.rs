use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProbeError;
use crate::prober::{ProbeContext, ProberKind, timeout_from_secs};
use crate::reporter::Reporter;
use crate::resolver::DispatchPlan;
use crate::schema::Invocation;
use crate::worker;

/// Runs one probe invocation in a region
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, region: &str, invocation: &Invocation) -> Result<(), ProbeError>;
}

#[derive(Debug, Deserialize)]
struct WorkerError {
    error: String,
}

/// Time a worker gets on top of the probe's own timeout for alerting and
/// persisting the result
const WORKER_MARGIN: Duration = Duration::from_secs(10);

/// Invokes the regional worker service over HTTP
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
    endpoints: BTreeMap<String, String>,
    timeout: Duration,
}

impl HttpInvoker {
    /// `endpoints` maps a region id to its worker base URL. `timeout` is the
    /// shortest deadline a worker call gets; jobs with a longer probe timeout get
    /// that timeout plus a margin instead.
    pub fn new(endpoints: BTreeMap<String, String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder().user_agent(crate::USER_AGENT).build()?;

        Ok(Self { client, endpoints, timeout })
    }

    /// Deadline for one worker call
    pub fn request_timeout(&self, invocation: &Invocation) -> Duration {
        self.timeout.max(timeout_from_secs(invocation.timeout) + WORKER_MARGIN)
    }

    /// Every region of the plan must have a worker endpoint
    pub fn check_coverage(&self, plan: &DispatchPlan) -> Result<(), ProbeError> {
        let missing: Vec<&str> = plan
            .region_ids()
            .into_iter()
            .filter(|region| !self.endpoints.contains_key(*region))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProbeError::config(format!("no worker endpoint configured for: {}", missing.join(", "))))
        }
    }

    fn endpoint(&self, region: &str) -> Result<String, ProbeError> {
        let base = self
            .endpoints
            .get(region)
            .ok_or_else(|| ProbeError::config(format!("no worker endpoint configured for {region}")))?;
        Ok(format!("{}/invoke", base.trim_end_matches('/')))
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, region: &str, invocation: &Invocation) -> Result<(), ProbeError> {
        let endpoint = self.endpoint(region)?;
        debug!("invoking {endpoint} for {}", invocation.target);

        let response = self
            .client
            .post(&endpoint)
            .timeout(self.request_timeout(invocation))
            .json(invocation)
            .send()
            .await
            .map_err(|e| ProbeError::Dispatch(format!("{region} worker unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = match response.json::<WorkerError>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        Err(ProbeError::Dispatch(format!("{region} worker returned {status}: {message}")))
    }
}

/// Runs probes in-process, as if every region were local
#[derive(Debug, Clone)]
pub struct LocalInvoker {
    kind: ProberKind,
    reporter: Reporter,
}

impl LocalInvoker {
    pub fn new(kind: ProberKind, reporter: Reporter) -> Self {
        Self { kind, reporter }
    }
}

#[async_trait]
impl Invoker for LocalInvoker {
    async fn invoke(&self, region: &str, invocation: &Invocation) -> Result<(), ProbeError> {
        let context = ProbeContext::new(region, self.reporter.clone());
        worker::execute(self.kind, context, invocation).await
    }
}
