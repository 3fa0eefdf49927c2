//! Worker settings read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use skyprobe::{DEFAULT_REGION, ProberKind};

use crate::error::AppError;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Region this worker reports results as
    pub region: String,
    pub bind: SocketAddr,
    pub prober: ProberKind,
    /// Append results to this JSON lines file instead of the log
    pub metrics_path: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let region = lookup("SKYPROBE_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let bind = lookup("SKYPROBE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()).parse()?;
        let prober = match lookup("SKYPROBE_PROBER") {
            Some(name) => name
                .parse()
                .map_err(|e: skyprobe::ProbeError| AppError::Setting { name: "SKYPROBE_PROBER", reason: e.to_string() })?,
            None => ProberKind::default(),
        };
        let metrics_path = lookup("SKYPROBE_METRICS_PATH").filter(|path| !path.is_empty()).map(PathBuf::from);

        Ok(Self { region, bind, prober, metrics_path })
    }
}
