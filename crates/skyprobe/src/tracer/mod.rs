//! HTTP round-trip tracer.
//!
//! The tracer is the reference [`Prober`]: it issues one real request over a
//! freshly built transport and breaks the round trip down into phases.

mod status;
mod timeline;
mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rustls::ClientConfig;
use tracing::{Instrument, info, info_span};
use url::Url;

pub use status::parse_status;
pub use timeline::Timeline;
pub use transport::{Exchange, RequestSpec, Transport, client_config};

use crate::error::ProbeError;
use crate::prober::{ProbeContext, Prober, ProberKind, parse_target, timeout_from_secs};
use crate::schema::invocation::validate_body;
use crate::schema::{Method, ProbeResult, Protocol};

/// Instrumented HTTP prober
#[derive(Debug)]
pub struct Tracer {
    name: String,
    context: ProbeContext,
    target: Option<Url>,
    protocol: Protocol,
    method: Method,
    body: Option<BTreeMap<String, String>>,
    header: Option<BTreeMap<String, String>>,
    rate: u32,
    timeout: Duration,
    slack_urls: Vec<String>,
    log_level: Option<String>,
    tls_config: Option<Arc<ClientConfig>>,
}

impl Tracer {
    pub fn new(context: ProbeContext) -> Self {
        Self {
            name: format!("Request from {}", context.region),
            context,
            target: None,
            protocol: Protocol::default(),
            method: Method::default(),
            body: None,
            header: None,
            rate: 1,
            timeout: timeout_from_secs(0),
            slack_urls: Vec::new(),
            log_level: None,
            tls_config: None,
        }
    }

    /// Verify https targets with these settings instead of the webpki roots,
    /// e.g. for targets behind a private CA
    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Perform the traced round trip without alerting or persisting
    pub async fn trace(&self) -> Result<ProbeResult, ProbeError> {
        let url = self.target.as_ref().ok_or_else(|| ProbeError::config("no target specified"))?;
        let spec = self.request_spec()?;
        let transport = Transport::for_target(url, self.protocol, self.tls_config.clone())?;

        let mut timeline = Timeline::start();
        let exchange = tokio::time::timeout(self.timeout, transport.round_trip(&spec, &mut timeline))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        let (status_code, status_message) = parse_status(&exchange.status_line())?;

        Ok(ProbeResult {
            url: url.to_string(),
            region: self.context.region.clone(),
            protocol: self.protocol,
            connect_addr: exchange.connect_addr.to_string(),
            phases: timeline.phases(self.protocol.is_tls()),
            status_code,
            status_message,
            headers: exchange.headers(),
            timestamp: Utc::now(),
        })
    }

    fn request_spec(&self) -> Result<RequestSpec, ProbeError> {
        validate_body(self.method, self.body.as_ref())?;

        let body = match &self.body {
            Some(body) => Some(Bytes::from(
                serde_json::to_vec(body).map_err(|e| ProbeError::config(e.to_string()))?,
            )),
            None => None,
        };

        Ok(RequestSpec { method: self.method, headers: self.header.clone().unwrap_or_default(), body })
    }

    /// Trace, then alert and persist through the reporter
    async fn execute(&self) -> Result<ProbeResult, ProbeError> {
        let target = self.target.as_ref().map(Url::to_string).unwrap_or_default();
        let span = info_span!("probe", region = %self.context.region, target = %target);

        async {
            let result = match self.trace().await {
                Ok(result) => result,
                Err(e) => {
                    if matches!(e, ProbeError::Network(_) | ProbeError::Timeout(_)) {
                        self.context
                            .reporter
                            .report_failure(&target, &self.context.region, &self.slack_urls, &e)
                            .await;
                    }
                    return Err(e);
                }
            };

            info!(
                "{} {} in {:?}",
                result.status_code, result.status_message, result.phases.total
            );
            if self.log_level.as_deref() == Some("debug") {
                info!("\n{result}");
            }

            self.context.reporter.report(&self.name, &self.slack_urls, &result).await?;
            Ok(result)
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl Prober for Tracer {
    fn kind(&self) -> ProberKind {
        ProberKind::Tracer
    }

    fn set_target(&mut self, url: &str, port: &str) -> Result<(), ProbeError> {
        let parsed = parse_target(url, port)?;
        self.protocol = Protocol::from_scheme(parsed.scheme())
            .ok_or_else(|| ProbeError::config(format!("unsupported URL scheme: {}", parsed.scheme())))?;
        info!("Target: {parsed}");
        self.target = Some(parsed);
        Ok(())
    }

    fn set_method(&mut self, method: Method) -> Result<(), ProbeError> {
        validate_body(method, self.body.as_ref())?;
        self.method = method;
        Ok(())
    }

    fn set_body(&mut self, body: BTreeMap<String, String>) -> Result<(), ProbeError> {
        validate_body(self.method, Some(&body))?;
        self.body = Some(body);
        Ok(())
    }

    fn set_header(&mut self, header: BTreeMap<String, String>) -> Result<(), ProbeError> {
        self.header = Some(header);
        Ok(())
    }

    fn set_rate(&mut self, rate: u32) {
        self.rate = rate;
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
        self.execute().await.map(|_| ())
    }

    async fn run_with_result(&mut self) -> Result<ProbeResult, ProbeError> {
        self.execute().await
    }
}
