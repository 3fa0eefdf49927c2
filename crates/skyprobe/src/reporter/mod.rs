//! Result reporting for skyprobe.
//!
//! The reporter decides whether a probe outcome warrants an alert, delivers
//! alerts through a [`Notifier`] and persists completed results through a
//! [`MetricsSink`]. Alert delivery failures are logged, never propagated.

pub mod sink;
pub mod slack;

use std::sync::Arc;

use tracing::{error, warn};

pub use sink::{JsonLinesSink, LogSink, MemorySink, MetricsSink};
pub use slack::{Notifier, SlackNotifier};

use crate::error::ProbeError;
use crate::schema::{ProbeResult, ResultRecord};

/// An alert about a single probe
#[derive(Debug, Clone)]
pub enum Alert<'a> {
    /// The round trip completed with an unexpected status
    Status { name: &'a str, result: &'a ProbeResult },
    /// No response was received at all
    Failure { target: &'a str, region: &'a str, error: String },
}

#[derive(Clone)]
pub struct Reporter {
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(notifier: Arc<dyn Notifier>, sink: Arc<dyn MetricsSink>) -> Self {
        Self { notifier, sink }
    }

    /// Slack alerts with results logged through tracing
    pub fn with_log_sink() -> Result<Self, ProbeError> {
        Ok(Self::new(Arc::new(SlackNotifier::new()?), Arc::new(LogSink)))
    }

    /// Whether a completed probe should raise an alert
    pub fn should_alert(result: &ProbeResult) -> bool {
        !result.is_ok()
    }

    /// Alert when needed, then persist the result
    pub async fn report(
        &self,
        name: &str,
        slack_urls: &[String],
        result: &ProbeResult,
    ) -> Result<(), ProbeError> {
        if Self::should_alert(result) {
            warn!("{} responded with {} {}", result.url, result.status_code, result.status_message);
            self.alert(slack_urls, &Alert::Status { name, result }).await;
        }

        self.sink.write(&ResultRecord::from(result)).await
    }

    /// Alert about a probe that produced no response
    pub async fn report_failure(
        &self,
        target: &str,
        region: &str,
        slack_urls: &[String],
        failure: &ProbeError,
    ) {
        let alert = Alert::Failure { target, region, error: failure.to_string() };
        self.alert(slack_urls, &alert).await;
    }

    async fn alert(&self, slack_urls: &[String], alert: &Alert<'_>) {
        for url in slack_urls {
            if let Err(e) = self.notifier.notify(url, alert).await {
                error!("{e}");
            }
        }
    }
}
