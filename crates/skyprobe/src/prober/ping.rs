use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{info, warn};
use url::Url;

use super::{ProbeContext, Prober, ProberKind, host_and_port, parse_target, timeout_from_secs, unsupported};
use crate::error::ProbeError;
use crate::schema::{Method, ProbeResult};

/// Summary of one ping run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PingStatistics {
    pub sent: u32,
    pub received: u32,
    pub min_rtt: Option<Duration>,
    pub avg_rtt: Option<Duration>,
    pub max_rtt: Option<Duration>,
}

impl PingStatistics {
    fn from_samples(sent: u32, samples: &[Duration]) -> Self {
        let received = samples.len() as u32;
        let avg_rtt = (received > 0).then(|| samples.iter().sum::<Duration>() / received);

        Self {
            sent,
            received,
            min_rtt: samples.iter().min().copied(),
            avg_rtt,
            max_rtt: samples.iter().max().copied(),
        }
    }

    pub fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        f64::from(self.sent - self.received) * 100.0 / f64::from(self.sent)
    }
}

/// Reachability prober. Each attempt is a TCP connect to the target's host
/// and port; raw ICMP would need elevated privileges.
#[derive(Debug)]
pub struct Ping {
    context: ProbeContext,
    target: Option<Url>,
    count: u32,
    timeout: Duration,
    slack_urls: Vec<String>,
    log_level: Option<String>,
}

impl Ping {
    pub fn new(context: ProbeContext) -> Self {
        Self {
            context,
            target: None,
            count: 1,
            timeout: timeout_from_secs(0),
            slack_urls: Vec::new(),
            log_level: None,
        }
    }

    pub fn slack_urls(&self) -> &[String] {
        &self.slack_urls
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }

    /// Run every attempt and summarise them
    pub async fn ping(&self) -> Result<PingStatistics, ProbeError> {
        let url = self.target.as_ref().ok_or_else(|| ProbeError::config("no target specified"))?;
        let (host, port) = host_and_port(url)?;

        let mut samples = Vec::with_capacity(self.count as usize);
        for seq in 0..self.count {
            let start = Instant::now();
            match timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await {
                Ok(Ok(_)) => samples.push(start.elapsed()),
                Ok(Err(e)) => warn!("ping {host}:{port} seq={seq} failed: {e}"),
                Err(_) => warn!("ping {host}:{port} seq={seq} timed out after {:?}", self.timeout),
            }
        }

        Ok(PingStatistics::from_samples(self.count, &samples))
    }
}

#[async_trait]
impl Prober for Ping {
    fn kind(&self) -> ProberKind {
        ProberKind::Ping
    }

    fn set_target(&mut self, url: &str, port: &str) -> Result<(), ProbeError> {
        let parsed = parse_target(url, port)?;
        host_and_port(&parsed)?;
        self.target = Some(parsed);
        Ok(())
    }

    fn set_method(&mut self, _method: Method) -> Result<(), ProbeError> {
        Ok(())
    }

    fn set_body(&mut self, _body: BTreeMap<String, String>) -> Result<(), ProbeError> {
        Err(unsupported(ProberKind::Ping, "set_body"))
    }

    fn set_header(&mut self, _header: BTreeMap<String, String>) -> Result<(), ProbeError> {
        Err(unsupported(ProberKind::Ping, "set_header"))
    }

    fn set_rate(&mut self, rate: u32) {
        self.count = rate.max(1);
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
        let stats = self.ping().await?;
        info!(
            region = %self.context.region,
            "{} packets transmitted, {} received, {:.1}% loss, rtt min/avg/max = {:?}/{:?}/{:?}",
            stats.sent,
            stats.received,
            stats.loss_percent(),
            stats.min_rtt.unwrap_or_default(),
            stats.avg_rtt.unwrap_or_default(),
            stats.max_rtt.unwrap_or_default(),
        );

        if stats.received == 0 {
            let target = self.target.as_ref().map(Url::to_string).unwrap_or_default();
            return Err(ProbeError::Network(format!("{target} is unreachable")));
        }
        Ok(())
    }

    async fn run_with_result(&mut self) -> Result<ProbeResult, ProbeError> {
        Err(unsupported(ProberKind::Ping, "run_with_result"))
    }
}
