//! Template type definitions for skyprobe.
//!
//! A template is the operator-owned description of what to probe and from where.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;
use crate::{DEFAULT_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS};

/// HTTP methods a target may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            _ => Err(ProbeError::config(format!("unsupported HTTP method: {s} (allowed: GET, POST)"))),
        }
    }
}

/// Named monitoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique template name
    pub name: String,

    /// Seconds between full passes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,

    /// Default probe timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Webhooks alerted when a probe fails
    #[serde(default)]
    pub slack_urls: Vec<String>,

    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default)]
    pub regions: Vec<Region>,
}

impl Template {
    /// Interval between passes, falling back to the platform default
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.filter(|secs| *secs > 0).unwrap_or(DEFAULT_INTERVAL_SECS))
    }

    /// Template-wide probe timeout in seconds
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.filter(|secs| *secs > 0).unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.region == id)
    }
}

/// A probeable endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    pub method: Method,

    /// JSON body fields, forbidden with GET
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<BTreeMap<String, String>>,

    /// Per-target timeout in seconds, overrides the template timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Only reachable from inside a private network
    #[serde(default)]
    pub internal: bool,

    /// Regions allowed to probe this target; empty means every region
    #[serde(default)]
    pub regions: Vec<String>,
}

impl Target {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            port: None,
            method,
            body: None,
            header: None,
            timeout: None,
            internal: false,
            regions: Vec::new(),
        }
    }

    pub fn is_restricted(&self) -> bool {
        !self.regions.is_empty()
    }

    pub fn allows(&self, region: &str) -> bool {
        !self.is_restricted() || self.regions.iter().any(|allowed| allowed == region)
    }

    pub fn has_body(&self) -> bool {
        self.body.as_ref().is_some_and(|body| !body.is_empty())
    }
}

/// A cloud region probes are launched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub region: String,

    #[serde(default)]
    pub security_groups: Vec<String>,

    #[serde(default)]
    pub subnets: Vec<String>,
}

impl Region {
    pub fn new(region: impl Into<String>) -> Self {
        Self { region: region.into(), security_groups: Vec::new(), subnets: Vec::new() }
    }

    /// Whether the region carries the network placement internal targets need
    pub fn has_placement(&self) -> bool {
        !self.security_groups.is_empty() && !self.subnets.is_empty()
    }
}
