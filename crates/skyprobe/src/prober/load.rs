use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{info, warn};
use url::Url;

use super::{ProbeContext, Prober, ProberKind, parse_target, timeout_from_secs, unsupported};
use crate::error::ProbeError;
use crate::schema::{Method, ProbeResult};

const DEFAULT_DURATION: Duration = Duration::from_secs(1);

/// Aggregated metrics of one load run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadMetrics {
    pub requests: u32,
    pub successes: u32,
    pub mean_latency: Duration,
    pub max_latency: Duration,
    /// Responses per status code
    pub status_codes: BTreeMap<u16, u32>,
    /// Requests that got no response
    pub errors: u32,
}

impl LoadMetrics {
    fn record(&mut self, latency: Duration, status: Option<u16>) {
        self.requests += 1;
        let total = self.mean_latency * (self.requests - 1) + latency;
        self.mean_latency = total / self.requests;
        self.max_latency = self.max_latency.max(latency);

        match status {
            Some(code) => {
                *self.status_codes.entry(code).or_default() += 1;
                if (200..300).contains(&code) {
                    self.successes += 1;
                }
            }
            None => self.errors += 1,
        }
    }

    pub fn success_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        f64::from(self.successes) / f64::from(self.requests)
    }
}

/// Fires requests at a fixed rate for a short duration
#[derive(Debug)]
pub struct LoadGenerator {
    context: ProbeContext,
    target: Option<Url>,
    method: Method,
    rate: u32,
    duration: Duration,
    timeout: Duration,
    slack_urls: Vec<String>,
    log_level: Option<String>,
}

impl LoadGenerator {
    pub fn new(context: ProbeContext) -> Self {
        Self {
            context,
            target: None,
            method: Method::default(),
            rate: 1,
            duration: DEFAULT_DURATION,
            timeout: timeout_from_secs(0),
            slack_urls: Vec::new(),
            log_level: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn slack_urls(&self) -> &[String] {
        &self.slack_urls
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }

    /// Fire `rate` requests per second until the duration elapses
    pub async fn attack(&self) -> Result<LoadMetrics, ProbeError> {
        let url = self.target.clone().ok_or_else(|| ProbeError::config("no target specified"))?;
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(crate::USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let method = match self.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let period = (Duration::from_secs(1) / self.rate).max(Duration::from_micros(1));
        let mut ticker = tokio::time::interval(period);
        let deadline = Instant::now() + self.duration;
        let mut requests = JoinSet::new();

        while Instant::now() < deadline {
            ticker.tick().await;
            let request = client.request(method.clone(), url.clone());
            requests.spawn(async move {
                let start = Instant::now();
                let status = match request.send().await {
                    Ok(response) => Some(response.status().as_u16()),
                    Err(e) => {
                        warn!("load request failed: {e}");
                        None
                    }
                };
                (start.elapsed(), status)
            });
        }

        let mut metrics = LoadMetrics::default();
        while let Some(joined) = requests.join_next().await {
            match joined {
                Ok((latency, status)) => metrics.record(latency, status),
                Err(e) => warn!("load request task failed: {e}"),
            }
        }
        Ok(metrics)
    }
}

#[async_trait]
impl Prober for LoadGenerator {
    fn kind(&self) -> ProberKind {
        ProberKind::LoadGenerator
    }

    fn set_target(&mut self, url: &str, port: &str) -> Result<(), ProbeError> {
        self.target = Some(parse_target(url, port)?);
        Ok(())
    }

    fn set_method(&mut self, method: Method) -> Result<(), ProbeError> {
        self.method = method;
        Ok(())
    }

    fn set_body(&mut self, _body: BTreeMap<String, String>) -> Result<(), ProbeError> {
        Err(unsupported(ProberKind::LoadGenerator, "set_body"))
    }

    fn set_header(&mut self, _header: BTreeMap<String, String>) -> Result<(), ProbeError> {
        Err(unsupported(ProberKind::LoadGenerator, "set_header"))
    }

    fn set_rate(&mut self, rate: u32) {
        self.rate = rate.max(1);
    }

    fn set_timeout(&mut self, seconds: u64) {
        self.timeout = timeout_from_secs(seconds);
    }

    fn set_slack_urls(&mut self, urls: Vec<String>) {
        self.slack_urls = urls;
    }

    fn set_log_level(&mut self, level: Option<String>) {
        self.log_level = level;
    }

    async fn run(&mut self) -> Result<(), ProbeError> {
        let metrics = self.attack().await?;
        info!(
            region = %self.context.region,
            "requests={} success={:.2}% errors={} latency mean={:?} max={:?} status_codes={:?}",
            metrics.requests,
            metrics.success_ratio() * 100.0,
            metrics.errors,
            metrics.mean_latency,
            metrics.max_latency,
            metrics.status_codes,
        );
        Ok(())
    }

    async fn run_with_result(&mut self) -> Result<ProbeResult, ProbeError> {
        Err(unsupported(ProberKind::LoadGenerator, "run_with_result"))
    }
}
