//! Error taxonomy for probing and dispatch.

use std::time::Duration;

use thiserror::Error;

use crate::prober::ProberKind;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// Bad template or payload. Raised before any dispatch and aborts the run.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// Alert delivery failed. Logged by the reporter, never a job outcome.
    #[error("notification error: {0}")]
    Notification(String),

    #[error("metrics sink error: {0}")]
    Sink(String),

    /// Remote invocation of a regional worker failed
    #[error("dispatch error: {0}")]
    Dispatch(String),

    #[error("{operation} is unsupported for the {kind} prober")]
    Unsupported { kind: ProberKind, operation: &'static str },
}

impl ProbeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether this error must stop a run instead of being recorded per job
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(error: std::io::Error) -> Self {
        Self::Network(error.to_string())
    }
}
