//! Prober strategy interface.
//!
//! Every monitoring check implements [`Prober`]. The set of variants is
//! closed ([`ProberKind`]); variants that cannot honour an operation return
//! [`ProbeError::Unsupported`].

mod load;
mod ping;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use load::{LoadGenerator, LoadMetrics};
pub use ping::{Ping, PingStatistics};

use crate::DEFAULT_TIMEOUT_SECS;
use crate::error::ProbeError;
use crate::reporter::Reporter;
use crate::schema::{Method, ProbeResult};
use crate::tracer::Tracer;

/// Available prober variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProberKind {
    /// Instrumented HTTP round trip
    #[default]
    #[serde(rename = "trace")]
    Tracer,
    /// Network reachability only
    Ping,
    /// Rate-based request generator
    #[serde(rename = "load")]
    LoadGenerator,
}

impl ProberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProberKind::Tracer => "trace",
            ProberKind::Ping => "ping",
            ProberKind::LoadGenerator => "load",
        }
    }

    /// Construct a prober of this kind
    pub fn build(self, context: ProbeContext) -> Box<dyn Prober> {
        match self {
            ProberKind::Tracer => Box::new(Tracer::new(context)),
            ProberKind::Ping => Box::new(Ping::new(context)),
            ProberKind::LoadGenerator => Box::new(LoadGenerator::new(context)),
        }
    }
}

impl fmt::Display for ProberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProberKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(ProberKind::Tracer),
            "ping" => Ok(ProberKind::Ping),
            "load" => Ok(ProberKind::LoadGenerator),
            other => Err(ProbeError::config(format!("unknown prober type: {other}"))),
        }
    }
}

/// Build a prober from its type name
pub fn new_prober(name: &str, context: ProbeContext) -> Result<Box<dyn Prober>, ProbeError> {
    Ok(name.parse::<ProberKind>()?.build(context))
}

/// Collaborators injected into every prober
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// Region the probe runs from
    pub region: String,
    pub reporter: Reporter,
}

impl ProbeContext {
    pub fn new(region: impl Into<String>, reporter: Reporter) -> Self {
        Self { region: region.into(), reporter }
    }
}

/// Contract every monitoring check satisfies
#[async_trait]
pub trait Prober: Send + Sync {
    fn kind(&self) -> ProberKind;

    /// Set the URL to probe; a non-empty `port` applies when the URL has none
    fn set_target(&mut self, url: &str, port: &str) -> Result<(), ProbeError>;

    fn set_method(&mut self, method: Method) -> Result<(), ProbeError>;

    fn set_body(&mut self, body: BTreeMap<String, String>) -> Result<(), ProbeError>;

    fn set_header(&mut self, header: BTreeMap<String, String>) -> Result<(), ProbeError>;

    fn set_rate(&mut self, rate: u32);

    /// Bound the network call; zero selects the default timeout
    fn set_timeout(&mut self, seconds: u64);

    fn set_slack_urls(&mut self, urls: Vec<String>);

    fn set_log_level(&mut self, level: Option<String>);

    /// Execute one probe, persisting its result
    async fn run(&mut self) -> Result<(), ProbeError>;

    /// Execute one probe and hand its result back to the caller
    async fn run_with_result(&mut self) -> Result<ProbeResult, ProbeError>;
}

pub(crate) fn timeout_from_secs(seconds: u64) -> Duration {
    Duration::from_secs(if seconds == 0 { DEFAULT_TIMEOUT_SECS } else { seconds })
}

pub(crate) fn unsupported(kind: ProberKind, operation: &'static str) -> ProbeError {
    ProbeError::Unsupported { kind, operation }
}

/// Resolve the host and port a target URL points at
pub(crate) fn host_and_port(url: &url::Url) -> Result<(String, u16), ProbeError> {
    let host = url
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| ProbeError::config(format!("URL has no host: {url}")))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ProbeError::config(format!("URL has no port: {url}")))?;
    Ok((host, port))
}

/// Parse a target URL and apply an explicit port when the URL carries none
pub(crate) fn parse_target(url: &str, port: &str) -> Result<url::Url, ProbeError> {
    let mut parsed = crate::schema::invocation::validate_url(url)?;

    if !port.is_empty() && parsed.port().is_none() {
        let port: u16 = port.parse().map_err(|_| ProbeError::config(format!("invalid port: {port}")))?;
        // Explicit default ports are normalised away by the url crate
        parsed
            .set_port(Some(port))
            .map_err(|_| ProbeError::config(format!("cannot set port on {url}")))?;
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [ProberKind::Tracer, ProberKind::Ping, ProberKind::LoadGenerator] {
            assert_eq!(kind.as_str().parse::<ProberKind>().unwrap(), kind);
        }
        assert!(matches!("vegeta".parse::<ProberKind>(), Err(ProbeError::Configuration(_))));
    }

    #[test]
    fn test_zero_timeout_uses_default() {
        assert_eq!(timeout_from_secs(0), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(timeout_from_secs(7), Duration::from_secs(7));
    }

    #[test]
    fn test_parse_target_applies_port() {
        let url = parse_target("http://example.com/health", "8080").unwrap();
        assert_eq!(url.port(), Some(8080));

        let url = parse_target("http://example.com:9000/health", "8080").unwrap();
        assert_eq!(url.port(), Some(9000));

        assert!(parse_target("http://example.com", "http").is_err());
    }

    #[test]
    fn test_host_and_port_defaults() {
        let url = url::Url::parse("https://example.com").unwrap();
        assert_eq!(host_and_port(&url).unwrap(), ("example.com".to_string(), 443));

        let url = url::Url::parse("http://[::1]:8080").unwrap();
        assert_eq!(host_and_port(&url).unwrap(), ("::1".to_string(), 8080));
    }
}
