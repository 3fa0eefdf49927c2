//! Probe result types.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport protocol inferred from the target URL scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Protocol::Https)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Https => write!(f, "HTTPS"),
        }
    }
}

/// Durations of each phase of one round trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub dns_lookup: Duration,
    pub tcp_connection: Duration,
    /// Only present for https targets
    pub tls_handshake: Option<Duration>,
    pub server_processing: Duration,
    pub content_transfer: Duration,
    pub total: Duration,
}

impl PhaseDurations {
    /// The individual phases in wire order, TLS included only when present
    pub fn phases(&self) -> Vec<(&'static str, Duration)> {
        let mut phases = vec![("DNS Lookup", self.dns_lookup), ("TCP Connection", self.tcp_connection)];
        if let Some(tls) = self.tls_handshake {
            phases.push(("TLS Handshake", tls));
        }
        phases.push(("Server Processing", self.server_processing));
        phases.push(("Content Transfer", self.content_transfer));
        phases
    }
}

/// Result of one completed round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub region: String,
    pub protocol: Protocol,

    /// Address the TCP connection was made to
    pub connect_addr: String,

    pub phases: PhaseDurations,
    pub status_code: u16,
    pub status_message: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "{:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };

        let write_0 = write_indented(0);
        let write_1 = write_indented(1);

        write_0(f, "Target", &self.url)?;
        write_0(f, "Region", &self.region)?;
        write_0(f, "Connect IP", &self.connect_addr)?;
        write_0(f, "Status Code", &self.status_code)?;
        write_0(f, "Status Message", &self.status_message)?;

        writeln!(f, "Headers")?;
        for (name, values) in &self.headers {
            write_1(f, name, &values.join(", "))?;
        }

        writeln!(f, "Phases")?;
        for (label, duration) in self.phases.phases() {
            write_1(f, label, &format!("{duration:?}"))?;
        }
        write_1(f, "Total", &format!("{:?}", self.phases.total))?;

        Ok(())
    }
}

/// Flattened record written to the metrics sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub target: String,
    pub region: String,
    pub protocol: Protocol,
    pub status_code: u16,
    pub dns_lookup_ms: u64,
    pub tcp_connection_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_handshake_ms: Option<u64>,
    pub server_processing_ms: u64,
    pub content_transfer_ms: u64,
    pub total_ms: u64,
    pub timestamp: DateTime<Utc>,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<&ProbeResult> for ResultRecord {
    fn from(result: &ProbeResult) -> Self {
        let phases = &result.phases;
        Self {
            target: result.url.clone(),
            region: result.region.clone(),
            protocol: result.protocol,
            status_code: result.status_code,
            dns_lookup_ms: millis(phases.dns_lookup),
            tcp_connection_ms: millis(phases.tcp_connection),
            tls_handshake_ms: phases.tls_handshake.map(millis),
            server_processing_ms: millis(phases.server_processing),
            content_transfer_ms: millis(phases.content_transfer),
            total_ms: millis(phases.total),
            timestamp: result.timestamp,
        }
    }
}
