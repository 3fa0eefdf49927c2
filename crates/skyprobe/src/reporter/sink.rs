//! Metrics sinks that persist result records.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::ProbeError;
use crate::schema::ResultRecord;

/// Destination for completed probe records
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write(&self, record: &ResultRecord) -> Result<(), ProbeError>;
}

/// Emits each record as a structured tracing event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MetricsSink for LogSink {
    async fn write(&self, record: &ResultRecord) -> Result<(), ProbeError> {
        info!(
            target: "skyprobe::metrics",
            target_url = %record.target,
            region = %record.region,
            protocol = %record.protocol,
            status_code = record.status_code,
            dns_lookup_ms = record.dns_lookup_ms,
            tcp_connection_ms = record.tcp_connection_ms,
            tls_handshake_ms = record.tls_handshake_ms,
            server_processing_ms = record.server_processing_ms,
            content_transfer_ms = record.content_transfer_ms,
            total_ms = record.total_ms,
            "probe result recorded"
        );
        Ok(())
    }
}

/// Appends records to a JSON lines file
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    // Serializes appends from concurrent probes
    lock: tokio::sync::Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: tokio::sync::Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetricsSink for JsonLinesSink {
    async fn write(&self, record: &ResultRecord) -> Result<(), ProbeError> {
        let mut line = serde_json::to_string(record).map_err(|e| ProbeError::Sink(e.to_string()))?;
        line.push('\n');

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| ProbeError::Sink(e.to_string()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ProbeError::Sink(format!("cannot open {}: {e}", self.path.display())))?;

        file.write_all(line.as_bytes()).await.map_err(|e| ProbeError::Sink(e.to_string()))?;
        file.flush().await.map_err(|e| ProbeError::Sink(e.to_string()))?;

        info!("Result saved to {}", self.path.display());
        Ok(())
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MetricsSink for MemorySink {
    async fn write(&self, record: &ResultRecord) -> Result<(), ProbeError> {
        self.records
            .lock()
            .map_err(|_| ProbeError::Sink("memory sink poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}
