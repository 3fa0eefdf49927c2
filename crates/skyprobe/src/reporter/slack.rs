//! Slack webhook notifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::Alert;
use crate::error::ProbeError;

const ERROR_COLOR: &str = "#FF0000";
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers alerts to a webhook endpoint
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, webhook: &str, alert: &Alert<'_>) -> Result<(), ProbeError>;
}

#[derive(Debug, Serialize)]
pub struct Body {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Text>,
}

impl Block {
    fn section(text: String) -> Self {
        Self { kind: "section", text: Some(Text { kind: "mrkdwn", text }) }
    }

    fn divider() -> Self {
        Self { kind: "divider", text: None }
    }
}

#[derive(Debug, Serialize)]
pub struct Text {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct Attachment {
    pub text: String,
    pub color: &'static str,
    pub fields: Vec<Field>,
}

#[derive(Debug, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl From<&Alert<'_>> for Body {
    fn from(alert: &Alert<'_>) -> Self {
        match alert {
            Alert::Status { name, result } => {
                let blocks = vec![
                    Block::section(format!("*{name}*")),
                    Block::divider(),
                    Block::section(format!("*Domain*: `{}`", result.url)),
                    Block::section(format!("*Connect IP*: `{}`", result.connect_addr)),
                    Block::section(format!("*Status Code*: {}", result.status_code)),
                    Block::section(format!("*Status Message*: {}", result.status_message)),
                    Block::divider(),
                ];

                let fields = result
                    .phases
                    .phases()
                    .into_iter()
                    .enumerate()
                    .map(|(index, (label, duration))| Field {
                        title: format!("[{}]{label}", index + 1),
                        value: format!("{duration:?}"),
                        short: true,
                    })
                    .collect();

                Body {
                    blocks,
                    attachments: vec![Attachment {
                        text: format!(
                            "*Request Tracing result* - Total Time: {:?}",
                            result.phases.total
                        ),
                        color: ERROR_COLOR,
                        fields,
                    }],
                }
            }
            Alert::Failure { target, region, error } => Body {
                blocks: vec![
                    Block::section(format!("Error occurred: `{target}`")),
                    Block::divider(),
                    Block::section(format!("*{region}*")),
                    Block::section(format!("*{error}*")),
                ],
                attachments: Vec::new(),
            },
        }
    }
}

/// Posts alerts as Slack incoming-webhook messages
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| ProbeError::Notification(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, webhook: &str, alert: &Alert<'_>) -> Result<(), ProbeError> {
        info!("Sending alert to webhook: {webhook}");

        let response = self
            .client
            .post(webhook)
            .json(&Body::from(alert))
            .send()
            .await
            .map_err(|e| ProbeError::Notification(format!("webhook request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() || text.trim() != "ok" {
            return Err(ProbeError::Notification(format!(
                "non-ok response returned from Slack ({status}): {text}"
            )));
        }

        Ok(())
    }
}
