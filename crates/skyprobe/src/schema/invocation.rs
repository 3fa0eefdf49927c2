//! Trigger invocation payload sent from the controller to a regional worker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use super::template::{Method, Target};
use crate::error::ProbeError;

/// One probe request for a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// The URL to probe
    pub target: String,

    pub method: Method,

    /// Timeout in seconds, 0 selects the prober default
    #[serde(default)]
    pub timeout: u64,

    #[serde(default)]
    pub port: String,

    #[serde(default)]
    pub slack_urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Invocation {
    /// Build the payload for a target, using `timeout` when the target sets none
    pub fn for_target(target: &Target, timeout: u64, slack_urls: &[String]) -> Self {
        Self {
            target: target.url.clone(),
            method: target.method,
            timeout: target.timeout.unwrap_or(timeout),
            port: target.port.clone().unwrap_or_default(),
            slack_urls: slack_urls.to_vec(),
            body: target.body.clone(),
            header: target.header.clone(),
            log_level: None,
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Validate the payload before a prober is built for it
    pub fn validate(&self) -> Result<(), ProbeError> {
        validate_url(&self.target)?;
        validate_port(&self.port)?;
        validate_body(self.method, self.body.as_ref())?;
        Ok(())
    }
}

/// Validate URL format and scheme
pub(crate) fn validate_url(url: &str) -> Result<Url, ProbeError> {
    if url.is_empty() {
        return Err(ProbeError::config("no target specified"));
    }

    let parsed = Url::parse(url).map_err(|e| ProbeError::config(format!("invalid URL {url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(ProbeError::config(format!("unsupported URL scheme: {other}"))),
    }

    if parsed.host_str().is_none() {
        return Err(ProbeError::config(format!("URL has no host: {url}")));
    }

    Ok(parsed)
}

fn validate_port(port: &str) -> Result<(), ProbeError> {
    if port.is_empty() {
        return Ok(());
    }

    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(ProbeError::config(format!("invalid port: {port}"))),
        Ok(_) => Ok(()),
    }
}

/// A body is only allowed with methods that carry one
pub(crate) fn validate_body(
    method: Method,
    body: Option<&BTreeMap<String, String>>,
) -> Result<(), ProbeError> {
    if method == Method::Get && body.is_some_and(|body| !body.is_empty()) {
        return Err(ProbeError::config("a request body is not allowed with GET"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(target: &str) -> Invocation {
        Invocation::for_target(&Target::new(target, Method::Get), 5, &[])
    }

    #[test]
    fn test_payload_wire_format() {
        let mut body = BTreeMap::new();
        body.insert("key".to_string(), "value".to_string());
        let mut target = Target::new("https://example.com/login", Method::Post);
        target.body = Some(body);
        target.port = Some("443".to_string());

        let payload = Invocation::for_target(&target, 3, &["https://hooks.slack.com/x".to_string()]);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["target"], "https://example.com/login");
        assert_eq!(json["method"], "POST");
        assert_eq!(json["timeout"], 3);
        assert_eq!(json["port"], "443");
        assert_eq!(json["slack_urls"][0], "https://hooks.slack.com/x");
        assert_eq!(json["body"]["key"], "value");
        assert!(json.get("header").is_none());
        assert!(json.get("log_level").is_none());
    }

    #[test]
    fn test_target_timeout_overrides_template() {
        let mut target = Target::new("https://example.com", Method::Get);
        target.timeout = Some(10);
        assert_eq!(Invocation::for_target(&target, 3, &[]).timeout, 10);
    }

    #[test]
    fn test_minimal_payload_deserializes() {
        let payload: Invocation =
            serde_json::from_str(r#"{"target": "http://example.com", "method": "GET"}"#).unwrap();
        assert_eq!(payload.timeout, 0);
        assert!(payload.port.is_empty());
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(invocation("https://example.com").validate().is_ok());
        assert!(invocation("").validate().is_err());
        assert!(invocation("ftp://example.com").validate().is_err());
        assert!(invocation("not a url").validate().is_err());

        let mut bad_port = invocation("https://example.com");
        bad_port.port = "0".to_string();
        assert!(bad_port.validate().is_err());

        let mut get_with_body = invocation("https://example.com");
        get_with_body.body = Some(BTreeMap::from([("a".to_string(), "b".to_string())]));
        assert!(matches!(get_with_body.validate(), Err(ProbeError::Configuration(_))));
    }
}
